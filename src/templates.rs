//! Sample resumes (Markdown + CSS) for demos and tests.
//!
//! Each template exercises a different slice of the supported Markdown and
//! CSS: headings, lists, tables, manual page breaks, custom properties.

/// A one-page engineering resume.
pub fn classic_resume() -> &'static str {
    r##"# Jane Doe

jane.doe@example.com · +1 555 0100 · github.com/janedoe

## Summary

Systems engineer with eight years of experience building **low-latency
services**, storage engines and developer tooling.

## Experience

### Senior Engineer, Acme Storage

*2021 – present*

- Led the rewrite of the ingestion path, cutting p99 latency by 60%
- Designed the on-disk format for the column store
- Mentored four engineers through their first production launches

### Software Engineer, Initech

*2017 – 2021*

- Built the internal build cache used by 300 engineers
- Owned the release pipeline and its on-call rotation

## Skills

| Area | Tools |
|------|-------|
| Languages | Rust, Go, C++ |
| Data | PostgreSQL, RocksDB, Kafka |
| Ops | Kubernetes, Terraform |

## Education

**B.Sc. Computer Science**, State University, 2017
"##
}

/// A longer resume with a manual page break before the publications.
pub fn two_page_resume() -> &'static str {
    r##"# John Smith

## Experience

### Principal Engineer, Globex

- Drove the migration of 40 services to a shared platform
- Authored the company-wide incident review process

### Staff Engineer, Hooli

- Built the search indexing pipeline
- Reduced infrastructure spend by a third

<break/>

## Publications

1. *Predictable Tail Latency in Shared Storage*, 2022
2. *Incremental Builds at Scale*, 2020

## Talks

> Lessons from ten years of on-call, RustConf 2023
"##
}

/// Minimal content: a single heading.
pub fn minimal_resume() -> &'static str {
    "# Name Surname\n"
}

/// Stylesheet that uses the custom properties every scope defines.
pub fn modern_css() -> &'static str {
    r##"
body { font-family: var(--font-family); color: #222222; }
h1 { font-size: 28px; margin: 0 0 4px 0; color: #1a365d; }
h2 {
    font-size: 16px;
    margin: 18px 0 6px 0;
    padding-bottom: 2px;
    border-bottom: 1px solid #cbd5e0;
    color: #2c5282;
}
h3 { font-size: 14px; margin: 10px 0 2px 0; }
p { margin: 0 0 6px 0; }
ul { margin: 0 0 8px 0; }
table { width: 100%; }
th { background-color: #edf2f7; text-align: left; }
blockquote { border-left: 3px solid #cbd5e0; padding-left: 10px; color: #4a5568; }

@media print {
    h2 { break-after: avoid; }
}
"##
}

/// Stylesheet with no custom properties or print rules.
pub fn plain_css() -> &'static str {
    "h1 { font-size: 24px; } h2 { font-size: 18px; }"
}
