use chrono::{Datelike, Utc};
use serde::Serialize;
use thiserror::Error;

pub const MIN_YEAR: i64 = 1900;

/// Raw upload/edit input collected from the multipart form before any
/// validation has run.
#[derive(Debug, Default, Clone)]
pub struct ThesisInput {
    pub title: String,
    pub abstract_text: String,
    pub authors: String,
    pub adviser: Option<String>,
    pub year_submitted: Option<i64>,
    pub college_id: Option<i64>,
    pub program_id: Option<i64>,
    pub panel_score: Option<f64>,
    pub tag_ids: Vec<i64>,
    pub pdf: Option<UploadedPdf>,
}

#[derive(Debug, Clone)]
pub struct UploadedPdf {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
#[error("thesis input failed validation")]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

/// Validates the upload/edit input as an ordered list of independent field
/// checks, aggregated into a single result. `has_existing_pdf` relaxes the
/// PDF requirement on edits of a record that already carries a document.
pub fn validate_thesis_input(
    input: &ThesisInput,
    has_existing_pdf: bool,
) -> Result<(), ValidationError> {
    let current_year = Utc::now().year() as i64;
    let mut errors = Vec::new();

    let checks: [(&'static str, Option<String>); 8] = [
        ("title", required_text(&input.title)),
        ("abstract", required_text(&input.abstract_text)),
        ("authors", required_text(&input.authors)),
        ("year_submitted", year_check(input.year_submitted, current_year)),
        ("college_id", required_reference(input.college_id)),
        ("program_id", required_reference(input.program_id)),
        ("panel_score", panel_score_check(input.panel_score)),
        ("pdf_file", pdf_check(input.pdf.as_ref(), has_existing_pdf)),
    ];

    for (field, outcome) in checks {
        if let Some(message) = outcome {
            errors.push(FieldError { field, message });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { errors })
    }
}

fn required_text(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        Some("This field is required.".to_string())
    } else {
        None
    }
}

fn required_reference(value: Option<i64>) -> Option<String> {
    match value {
        Some(id) if id > 0 => None,
        _ => Some("This field is required.".to_string()),
    }
}

fn year_check(year: Option<i64>, current_year: i64) -> Option<String> {
    match year {
        None => Some("A valid year is required.".to_string()),
        Some(y) if y < MIN_YEAR => Some(format!("Year must be {MIN_YEAR} or later.")),
        Some(y) if y > current_year => {
            Some(format!("Year cannot be later than {current_year}."))
        }
        Some(_) => None,
    }
}

fn panel_score_check(score: Option<f64>) -> Option<String> {
    match score {
        Some(s) if !(0.0..=100.0).contains(&s) => {
            Some("Panel score must be between 0 and 100.".to_string())
        }
        _ => None,
    }
}

fn pdf_check(pdf: Option<&UploadedPdf>, has_existing_pdf: bool) -> Option<String> {
    match pdf {
        Some(file) if !file.file_name.to_lowercase().ends_with(".pdf") => {
            Some("The uploaded file must be a PDF.".to_string())
        }
        Some(_) => None,
        None if has_existing_pdf => None,
        None => Some("Please upload a PDF file for this thesis.".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_input() -> ThesisInput {
        ThesisInput {
            title: "A Study of Things".to_string(),
            abstract_text: "We study things.".to_string(),
            authors: "Jane Doe, John Roe".to_string(),
            adviser: Some("Prof. Smith".to_string()),
            year_submitted: Some(2023),
            college_id: Some(1),
            program_id: Some(1),
            panel_score: Some(92.5),
            tag_ids: vec![],
            pdf: Some(UploadedPdf {
                file_name: "thesis.pdf".to_string(),
                bytes: vec![0x25, 0x50, 0x44, 0x46],
            }),
        }
    }

    #[test]
    fn accepts_a_complete_submission() {
        assert!(validate_thesis_input(&valid_input(), false).is_ok());
    }

    #[test]
    fn rejects_years_outside_the_bounds() {
        let current_year = Utc::now().year() as i64;

        let mut input = valid_input();
        input.year_submitted = Some(1899);
        let err = validate_thesis_input(&input, false).unwrap_err();
        assert!(err.errors.iter().any(|e| e.field == "year_submitted"));

        input.year_submitted = Some(current_year + 1);
        let err = validate_thesis_input(&input, false).unwrap_err();
        assert!(err.errors.iter().any(|e| e.field == "year_submitted"));

        input.year_submitted = Some(current_year);
        assert!(validate_thesis_input(&input, false).is_ok());
    }

    #[test]
    fn requires_a_pdf_on_create_but_not_on_edit_with_existing_file() {
        let mut input = valid_input();
        input.pdf = None;

        let err = validate_thesis_input(&input, false).unwrap_err();
        assert!(err.errors.iter().any(|e| e.field == "pdf_file"));

        assert!(validate_thesis_input(&input, true).is_ok());
    }

    #[test]
    fn aggregates_every_failing_field() {
        let input = ThesisInput::default();
        let err = validate_thesis_input(&input, false).unwrap_err();
        let fields: Vec<&str> = err.errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "title",
                "abstract",
                "authors",
                "year_submitted",
                "college_id",
                "program_id",
                "pdf_file"
            ]
        );
    }

    #[test]
    fn rejects_non_pdf_uploads() {
        let mut input = valid_input();
        input.pdf = Some(UploadedPdf {
            file_name: "thesis.docx".to_string(),
            bytes: vec![],
        });
        let err = validate_thesis_input(&input, false).unwrap_err();
        assert!(err.errors.iter().any(|e| e.field == "pdf_file"));
    }
}
