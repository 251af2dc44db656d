//! Multipart intake: file parts are staged into the job as they arrive and text
//! parts are validated the moment they are read.
//!
//! Options that precede the files therefore fail before any storage exists, and
//! options that follow them fail with the job's work area released inline.

use axum::extract::Multipart;
use folio_jobs::{InputKind, Job, JobError, JobResult, options::parse_output_name};
use tracing::debug;

use crate::http::errors::ApiError;

/// Which form fields carry uploads, what they must contain, and how many may arrive.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FileRule {
    fields: &'static [&'static str],
    kind: InputKind,
    max: usize,
}

impl FileRule {
    /// Exactly one upload; a second file part is rejected.
    pub(crate) const fn single(fields: &'static [&'static str], kind: InputKind) -> Self {
        Self {
            fields,
            kind,
            max: 1,
        }
    }

    /// Any number of uploads, kept in arrival order.
    pub(crate) const fn many(fields: &'static [&'static str], kind: InputKind) -> Self {
        Self {
            fields,
            kind,
            max: usize::MAX,
        }
    }

    fn carries(&self, name: &str) -> bool {
        self.fields.contains(&name)
    }
}

/// Drain `multipart` into `job`.
///
/// Text fields go to `on_text`; unknown names are its business to ignore. File
/// parts under other names are skipped unread. File parts beyond the rule's
/// limit fail the job as invalid input.
pub(crate) async fn read_form<F>(
    mut multipart: Multipart,
    job: &mut Job,
    rule: FileRule,
    mut on_text: F,
) -> Result<(), ApiError>
where
    F: FnMut(&str, String) -> JobResult<()>,
{
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Ok(()),
            Err(err) => return Err(abort(job, &err)),
        };
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        if rule.carries(&name) {
            let filename = field.file_name().unwrap_or_default().to_owned();
            if filename.is_empty() {
                return Err(job.fail(JobError::invalid_input("No file provided.")).into());
            }
            if job.inputs().len() >= rule.max {
                return Err(job
                    .fail(JobError::invalid_input("Only one file may be uploaded."))
                    .into());
            }
            let content_type = field.content_type().map(str::to_owned);
            job.stage(field, &filename, content_type.as_deref(), rule.kind)
                .await?;
            continue;
        }
        if field.file_name().is_some() {
            debug!(job_id = %job.id(), field = %name, "unexpected file part ignored");
            continue;
        }

        let value = match field.text().await {
            Ok(value) => value,
            Err(err) => return Err(abort(job, &err)),
        };
        if let Err(err) = on_text(&name, value) {
            return Err(job.fail(err).into());
        }
    }
}

fn abort(job: &mut Job, err: &axum::extract::multipart::MultipartError) -> ApiError {
    drop(job.fail(JobError::invalid_input(err.body_text())));
    ApiError::from(err)
}

/// Replace `slot` with the sanitised output name in `raw`; blank keeps the default.
pub(crate) fn set_output_name(slot: &mut String, field: &'static str, raw: &str) -> JobResult<()> {
    if !raw.trim().is_empty() {
        *slot = parse_output_name(field, raw)?;
    }
    Ok(())
}

/// Value of a text field, `None` when blank.
pub(crate) fn non_blank(raw: String) -> Option<String> {
    if raw.trim().is_empty() { None } else { Some(raw) }
}

/// Fail the job unless a required option was supplied.
pub(crate) fn require_option<T>(job: &mut Job, value: Option<T>, field: &'static str) -> JobResult<T> {
    value.ok_or_else(|| job.fail(JobError::invalid_options(field, format!("`{field}` is required."))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_output_names_keep_the_default() -> JobResult<()> {
        let mut slot = "merged_document.pdf".to_string();
        set_output_name(&mut slot, "output_filename", "   ")?;
        assert_eq!(slot, "merged_document.pdf");
        set_output_name(&mut slot, "output_filename", "../../etc/report.pdf")?;
        assert_eq!(slot, "report.pdf");
        Ok(())
    }

    #[test]
    fn rule_matches_only_its_fields() {
        let rule = FileRule::many(&["files"], InputKind::Pdf);
        assert!(rule.carries("files"));
        assert!(!rule.carries("file"));
        assert_eq!(rule.max, usize::MAX);
        assert_eq!(FileRule::single(&["file"], InputKind::Pdf).max, 1);
        assert_eq!(non_blank("  ".into()), None);
        assert_eq!(non_blank("es".into()).as_deref(), Some("es"));
    }
}
