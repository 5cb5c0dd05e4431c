use crate::model::Verdict;
use crate::report::RunArtifacts;
use std::io::Write;
use std::path::Path;

pub fn write_report(artifacts: &RunArtifacts, out: &Path) -> anyhow::Result<()> {
    let body = serde_json::to_string_pretty(artifacts)?;
    std::fs::write(out, body)?;
    Ok(())
}

/// One verdict per line, the same shape the dataset side consumes.
pub fn write_verdicts_jsonl(verdicts: &[Verdict], out: &Path) -> anyhow::Result<()> {
    let mut f = std::fs::File::create(out)?;
    for v in verdicts {
        serde_json::to_writer(&mut f, v)?;
        writeln!(f)?;
    }
    Ok(())
}
