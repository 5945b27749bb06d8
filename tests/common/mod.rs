#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use pkgrisk::metrics::{CveRecord, QualityRatings, RawMetricsBundle, Severity};
use pkgrisk::models::{CollectedPackage, Platform, RepoRef};
use std::path::Path;

pub fn collected_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

/// Active, well-documented package with a linked repository
pub fn healthy_bundle(ecosystem: &str, name: &str) -> RawMetricsBundle {
    let now = collected_at();
    let mut bundle = RawMetricsBundle::new(ecosystem, name, now);
    bundle.repository = Some(RepoRef {
        platform: Platform::Github,
        owner: "acme".to_string(),
        repo: name.trim_start_matches('@').replace('/', "-"),
        subpath: None,
    });

    bundle.security.has_security_policy = true;
    bundle.security.security_tools = vec!["dependabot".to_string(), "codeql".to_string()];

    let m = &mut bundle.maintenance;
    m.last_commit_at = Some(now - Duration::days(3));
    m.commits_last_6mo = 47;
    m.open_issues = 10;
    m.closed_issues_6mo = 40;
    m.avg_issue_response_hours = Some(12.0);
    m.releases_last_year = 6;

    let c = &mut bundle.community;
    c.stars = 50_000;
    c.forks = 9_000;
    c.created_at = Some(now - Duration::days(10 * 365));
    c.total_contributors = 700;
    c.good_first_issues = 12;
    c.has_discussions = true;
    c.install_count = Some(250_000_000);

    let b = &mut bundle.bus_factor;
    b.contributors_over_5pct = 4;
    b.top_contributor_share = Some(0.3);
    b.commit_shares = vec![0.3, 0.25, 0.25, 0.2];
    b.active_contributors_6mo = 12;
    b.has_codeowners = true;
    b.has_governance = true;

    let d = &mut bundle.documentation;
    d.has_readme = true;
    d.has_docs_dir = true;
    d.has_examples_dir = true;
    d.has_changelog = true;
    d.has_contributing = true;
    d.quality = Some(QualityRatings {
        clarity: 10.0,
        installation: 10.0,
        quick_start: 10.0,
        examples: 10.0,
    });

    let s = &mut bundle.stability;
    s.latest_version = Some("2.32.3".to_string());
    s.prerelease_ratio = 0.05;
    s.has_tests = true;
    s.has_ci = true;
    s.ci_pass_rate = Some(0.98);

    bundle
}

/// Bare bundle: no repository, nothing known beyond the name
pub fn unlinked_bundle(ecosystem: &str, name: &str) -> RawMetricsBundle {
    RawMetricsBundle::new(ecosystem, name, collected_at())
}

pub fn unpatched_cve(severity: Severity) -> CveRecord {
    CveRecord {
        id: "CVE-2025-0001".to_string(),
        severity,
        published_at: collected_at() - Duration::days(10),
        fixed_version: None,
        days_to_patch: None,
    }
}

pub fn package(metrics: RawMetricsBundle) -> CollectedPackage {
    CollectedPackage {
        version: "1.0.0".to_string(),
        description: format!("The {} package", metrics.name),
        metrics,
    }
}

/// Write collected packages as `NNN.json` files
pub fn write_collected(dir: &Path, packages: &[CollectedPackage]) {
    std::fs::create_dir_all(dir).unwrap();
    for (i, package) in packages.iter().enumerate() {
        let json = serde_json::to_string_pretty(package).unwrap();
        std::fs::write(dir.join(format!("{:03}.json", i)), json).unwrap();
    }
}
