//! Integrity verification for an open library.
//!
//! [`SpectrumLibrary::verify`] runs a fixed checklist over the manifest,
//! the index tables and the payload files and collects the outcome into a
//! [`VerifyReport`]. Verification is strictly read-only: stray files and
//! broken rows are reported, never repaired or deleted.

use std::collections::HashSet;
use std::fmt;
use std::fs;

use crate::library::schema::{payload_file_name, LibraryManifest, SPECTRA_DIR};
use crate::library::{LibraryError, SpectrumLibrary};
use crate::metadata::keys;
use crate::spectrum::Spectrum;

/// Outcome of a single integrity check.
#[derive(Debug, Clone)]
pub enum CheckStatus {
    /// The check passed.
    Ok,
    /// The check found something suspicious but not fatal.
    Warning(String),
    /// The check found a genuine integrity problem.
    Failed(String),
}

impl CheckStatus {
    fn is_ok(&self) -> bool {
        matches!(self, CheckStatus::Ok)
    }

    fn is_failed(&self) -> bool {
        matches!(self, CheckStatus::Failed(_))
    }
}

/// One named integrity check and its outcome.
#[derive(Debug, Clone)]
pub struct VerifyCheck {
    /// Short human-readable name of the check.
    pub name: String,
    /// What the check found.
    pub status: CheckStatus,
}

impl VerifyCheck {
    fn ok(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Ok,
        }
    }

    fn warning(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Warning(message.into()),
        }
    }

    fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Failed(message.into()),
        }
    }
}

/// Complete report of a verification run.
#[derive(Debug)]
pub struct VerifyReport {
    /// Every check that was run, in order.
    pub checks: Vec<VerifyCheck>,
    /// Path of the verified library.
    pub library: String,
}

impl VerifyReport {
    fn new(library: impl Into<String>) -> Self {
        Self {
            checks: Vec::new(),
            library: library.into(),
        }
    }

    fn add(&mut self, check: VerifyCheck) {
        self.checks.push(check);
    }

    /// Whether any check failed outright.
    pub fn has_failures(&self) -> bool {
        self.checks.iter().any(|c| c.status.is_failed())
    }

    /// Whether any check produced a warning.
    pub fn has_warnings(&self) -> bool {
        self.checks
            .iter()
            .any(|c| matches!(c.status, CheckStatus::Warning(_)))
    }

    /// Number of checks that passed.
    pub fn success_count(&self) -> usize {
        self.checks.iter().filter(|c| c.status.is_ok()).count()
    }

    /// Number of checks that warned.
    pub fn warning_count(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| matches!(c.status, CheckStatus::Warning(_)))
            .count()
    }

    /// Number of checks that failed.
    pub fn failure_count(&self) -> usize {
        self.checks.iter().filter(|c| c.status.is_failed()).count()
    }

    /// Format the report with colours (requires the `colorized_output`
    /// feature, plain [`Display`](fmt::Display) output otherwise).
    pub fn format_colored(&self) -> String {
        #[cfg(feature = "colorized_output")]
        {
            use console::{style, Emoji};

            static OK: Emoji<'_, '_> = Emoji("✓", "[OK]");
            static WARN: Emoji<'_, '_> = Emoji("⚠", "[WARN]");
            static FAIL: Emoji<'_, '_> = Emoji("✗", "[FAIL]");

            let mut output = String::new();

            output.push_str(&format!(
                "{}\n",
                style("Library integrity report").bold().cyan()
            ));
            output.push_str(&format!("{}\n", style("========================").cyan()));
            output.push_str(&format!(
                "{}: {}\n\n",
                style("Library").bold(),
                self.library
            ));

            for check in &self.checks {
                let (symbol, color_fn): (_, fn(&str) -> console::StyledObject<&str>) =
                    match &check.status {
                        CheckStatus::Ok => (OK, |s| style(s).green()),
                        CheckStatus::Warning(_) => (WARN, |s| style(s).yellow()),
                        CheckStatus::Failed(_) => (FAIL, |s| style(s).red()),
                    };

                output.push_str(&format!("[{}] {}", symbol, color_fn(&check.name)));

                match &check.status {
                    CheckStatus::Ok => output.push('\n'),
                    CheckStatus::Warning(msg) => {
                        output.push_str(&format!(
                            " - {}: {}\n",
                            style("WARNING").yellow().bold(),
                            msg
                        ));
                    }
                    CheckStatus::Failed(msg) => {
                        output.push_str(&format!(
                            " - {}: {}\n",
                            style("FAILED").red().bold(),
                            msg
                        ));
                    }
                }
            }

            output.push('\n');
            output.push_str(&format!(
                "{}: {} passed, {} warnings, {} failed\n",
                style("Summary").bold(),
                style(self.success_count()).green(),
                style(self.warning_count()).yellow(),
                style(self.failure_count()).red()
            ));

            output.push('\n');
            if self.has_failures() {
                output.push_str(&format!("{}\n", style("Verification FAILED").red().bold()));
            } else if self.has_warnings() {
                output.push_str(&format!(
                    "{}\n",
                    style("Verification PASSED with warnings").yellow().bold()
                ));
            } else {
                output.push_str(&format!("{}\n", style("Verification PASSED").green().bold()));
            }

            output
        }

        #[cfg(not(feature = "colorized_output"))]
        {
            format!("{}", self)
        }
    }
}

impl fmt::Display for VerifyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Library integrity report")?;
        writeln!(f, "========================")?;
        writeln!(f, "Library: {}", self.library)?;
        writeln!(f)?;

        for check in &self.checks {
            let symbol = match &check.status {
                CheckStatus::Ok => "✓",
                CheckStatus::Warning(_) => "⚠",
                CheckStatus::Failed(_) => "✗",
            };

            write!(f, "[{}] {}", symbol, check.name)?;

            match &check.status {
                CheckStatus::Ok => writeln!(f)?,
                CheckStatus::Warning(msg) => writeln!(f, " - WARNING: {}", msg)?,
                CheckStatus::Failed(msg) => writeln!(f, " - FAILED: {}", msg)?,
            }
        }

        writeln!(f)?;
        writeln!(
            f,
            "Summary: {} passed, {} warnings, {} failed",
            self.success_count(),
            self.warning_count(),
            self.failure_count()
        )?;

        writeln!(f)?;
        if self.has_failures() {
            writeln!(f, "Verification FAILED")
        } else if self.has_warnings() {
            writeln!(f, "Verification PASSED with warnings")
        } else {
            writeln!(f, "Verification PASSED")
        }
    }
}

impl SpectrumLibrary {
    /// Run the integrity checklist over this library.
    ///
    /// Returns `Err` only when the check run itself cannot proceed (the
    /// index database is unreadable); findings land in the report.
    pub fn verify(&self) -> Result<VerifyReport, LibraryError> {
        let mut report = VerifyReport::new(self.root().display().to_string());

        check_manifest(self, &mut report);
        let ids = self.entries()?.into_iter().map(|e| e.id).collect::<Vec<_>>();
        check_payload_files(self, &ids, &mut report)?;
        check_metadata_rows(self, &mut report)?;
        check_continuum_flag(self, &mut report)?;
        check_storage_classes(self, &mut report)?;

        Ok(report)
    }
}

fn check_manifest(library: &SpectrumLibrary, report: &mut VerifyReport) {
    match LibraryManifest::load(library.root()) {
        Ok(_) => report.add(VerifyCheck::ok("Manifest readable")),
        Err(e) => report.add(VerifyCheck::failed("Manifest readable", e.to_string())),
    }
}

/// Payload checks: every entry's payload file present and loadable, and no
/// stray files in `spectra/` that belong to no entry.
fn check_payload_files(
    library: &SpectrumLibrary,
    ids: &[i64],
    report: &mut VerifyReport,
) -> Result<(), LibraryError> {
    let mut missing = Vec::new();
    let mut unreadable = Vec::new();

    for &id in ids {
        let path = library.payload_path(id);
        if !path.is_file() {
            missing.push(id);
            continue;
        }
        let metadata = library.metadata_for(id)?;
        if let Err(e) =
            Spectrum::load_from_file(&path, metadata, None, library.payload_format())
        {
            unreadable.push((id, e.to_string()));
        }
    }

    if missing.is_empty() {
        report.add(VerifyCheck::ok("Entry payloads present"));
    } else {
        report.add(VerifyCheck::failed(
            "Entry payloads present",
            format!("{} entries without a payload file (ids {:?})", missing.len(), missing),
        ));
    }

    if unreadable.is_empty() {
        report.add(VerifyCheck::ok("Entry payloads readable"));
    } else {
        let (first_id, first_err) = &unreadable[0];
        report.add(VerifyCheck::failed(
            "Entry payloads readable",
            format!(
                "{} unreadable payloads (first: entry {}: {})",
                unreadable.len(),
                first_id,
                first_err
            ),
        ));
    }

    let expected: HashSet<String> = ids.iter().map(|&id| payload_file_name(id)).collect();
    let mut orphans = Vec::new();
    for dir_entry in fs::read_dir(library.root().join(SPECTRA_DIR))? {
        let dir_entry = dir_entry?;
        if !dir_entry.file_type()?.is_file() {
            continue;
        }
        let name = dir_entry.file_name().to_string_lossy().into_owned();
        if !expected.contains(&name) {
            orphans.push(name);
        }
    }

    if orphans.is_empty() {
        report.add(VerifyCheck::ok("No orphan payloads"));
    } else {
        orphans.sort();
        report.add(VerifyCheck::warning(
            "No orphan payloads",
            format!("{} files belong to no entry: {:?}", orphans.len(), orphans),
        ));
    }

    Ok(())
}

/// Metadata rows must reference an existing entry and an existing field.
fn check_metadata_rows(
    library: &SpectrumLibrary,
    report: &mut VerifyReport,
) -> Result<(), LibraryError> {
    let orphan_rows: i64 = library.conn.query_row(
        "SELECT COUNT(*) FROM metadata_values v \
         WHERE NOT EXISTS (SELECT 1 FROM entries e WHERE e.id = v.entry_id) \
            OR NOT EXISTS (SELECT 1 FROM metadata_fields f WHERE f.field_id = v.field_id)",
        [],
        |row| row.get(0),
    )?;

    if orphan_rows == 0 {
        report.add(VerifyCheck::ok("Metadata rows anchored"));
    } else {
        report.add(VerifyCheck::failed(
            "Metadata rows anchored",
            format!("{orphan_rows} metadata rows reference a missing entry or field"),
        ));
    }
    Ok(())
}

/// Every entry must carry the continuum_normalised flag.
fn check_continuum_flag(
    library: &SpectrumLibrary,
    report: &mut VerifyReport,
) -> Result<(), LibraryError> {
    let bare: i64 = library.conn.query_row(
        "SELECT COUNT(*) FROM entries e \
         WHERE NOT EXISTS ( \
             SELECT 1 FROM metadata_values v \
             JOIN metadata_fields f ON f.field_id = v.field_id \
             WHERE v.entry_id = e.id AND f.name = ?1)",
        [keys::CONTINUUM_NORMALISED],
        |row| row.get(0),
    )?;

    if bare == 0 {
        report.add(VerifyCheck::ok("Continuum flag present"));
    } else {
        report.add(VerifyCheck::failed(
            "Continuum flag present",
            format!("{bare} entries lack {}", keys::CONTINUUM_NORMALISED),
        ));
    }
    Ok(())
}

/// The storage class of every stored value must match its field's declared
/// kind: numeric fields hold INTEGER or REAL, text fields hold TEXT.
fn check_storage_classes(
    library: &SpectrumLibrary,
    report: &mut VerifyReport,
) -> Result<(), LibraryError> {
    let drifted: i64 = library.conn.query_row(
        "SELECT COUNT(*) FROM metadata_values v \
         JOIN metadata_fields f ON f.field_id = v.field_id \
         WHERE (f.kind = 'numeric' AND typeof(v.value) NOT IN ('integer', 'real')) \
            OR (f.kind = 'text' AND typeof(v.value) != 'text')",
        [],
        |row| row.get(0),
    )?;

    if drifted == 0 {
        report.add(VerifyCheck::ok("Storage classes consistent"));
    } else {
        report.add(VerifyCheck::failed(
            "Storage classes consistent",
            format!("{drifted} stored values disagree with their field's kind"),
        ));
    }
    Ok(())
}
