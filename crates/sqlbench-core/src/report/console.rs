use crate::aggregate::RateStat;
use crate::report::RunArtifacts;

pub fn print_summary(artifacts: &RunArtifacts) {
    eprintln!("\nEvaluated {} tasks...", artifacts.verdicts.len());

    for v in &artifacts.verdicts {
        let duration = v
            .duration_ms
            .map(|d| format!("({:.1}s)", d as f64 / 1000.0))
            .unwrap_or_default();

        if v.passed {
            eprintln!("✅ {:<24} {}", v.instance_id, duration);
            continue;
        }

        let kind = v.error.map(|e| e.as_str()).unwrap_or("failed");
        let harness = v.error.map(|e| e.is_harness()).unwrap_or(false);
        let icon = if harness { "💥" } else { "❌" };
        eprintln!("{} {:<24} {} {}", icon, v.instance_id, kind, duration);
        if !v.detail.is_empty() {
            eprintln!("    {}", truncate(&v.detail, 200));
        }
    }

    eprintln!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    eprintln!("Overall:    {}", render_stat(&artifacts.metrics.overall));
    for (category, stat) in &artifacts.metrics.by_category {
        eprintln!("{:<11} {}", format!("{:?}:", category), render_stat(stat));
    }
    for (tier, stat) in &artifacts.metrics.by_tier {
        eprintln!("{:<11} {}", format!("{:?}:", tier), render_stat(stat));
    }
    if artifacts.invalid_records > 0 {
        eprintln!("Invalid:    {} task records skipped by validation", artifacts.invalid_records);
    }
    if let Some(avg) = artifacts.metrics.avg_cost {
        eprintln!("Avg cost:   ${:.4} per task", avg);
    }
}

fn render_stat(stat: &RateStat) -> String {
    format!(
        "{}/{} passed ({:.1}%), {} failed, {} harness errors",
        stat.passed,
        stat.total,
        stat.success_rate * 100.0,
        stat.failed,
        stat.errored
    )
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_len).collect();
    out.push('…');
    out
}
