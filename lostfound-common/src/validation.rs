//! Field checks run on request bodies before any handler touches the store.
//!
//! Missing fields deserialize as empty strings so that they are reported
//! as field errors instead of failing the whole body.

use crate::model::post::{CALENDAR_DATE_FORMAT, PostContent};
use serde::{Deserialize, Serialize};
use time::Date;
use validator::{Validate, ValidationErrors};

/// Rust field name and the name it carries on the wire, in declaration order.
type FieldNames = &'static [(&'static str, &'static str)];

const POST_FIELDS: FieldNames = &[
    ("text", "text"),
    ("founded_date", "foundedDate"),
    ("location", "location"),
];
const COMMENT_FIELDS: FieldNames = &[("text", "text")];

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct PostRequest {
    #[validate(length(min = 1, message = "Text is required"))]
    pub text: String,
    #[validate(length(min = 1, message = "Founded date is required"))]
    pub founded_date: String,
    #[validate(length(min = 1, message = "Location is required"))]
    pub location: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Validate)]
#[serde(default)]
pub struct CommentRequest {
    #[validate(length(min = 1, message = "Text is required"))]
    pub text: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub msg: String,
}

impl FieldError {
    #[must_use]
    pub fn new(field: &'static str, msg: impl Into<String>) -> Self {
        Self {
            field,
            msg: msg.into(),
        }
    }
}

pub fn validate_post(request: PostRequest) -> Result<PostContent, Vec<FieldError>> {
    let mut errors = field_errors(request.validate(), POST_FIELDS);

    let founded_date = Date::parse(&request.founded_date, CALENDAR_DATE_FORMAT);
    if founded_date.is_err() && !request.founded_date.is_empty() {
        errors.push(FieldError::new(
            "foundedDate",
            "Founded date must be a valid date",
        ));
        errors.sort_by_key(|error| field_position(POST_FIELDS, error.field));
    }

    match founded_date {
        Ok(founded_date) if errors.is_empty() => Ok(PostContent {
            text: request.text,
            founded_date,
            location: request.location,
        }),
        _ => Err(errors),
    }
}

pub fn validate_comment(request: CommentRequest) -> Result<String, Vec<FieldError>> {
    let errors = field_errors(request.validate(), COMMENT_FIELDS);
    if errors.is_empty() {
        Ok(request.text)
    } else {
        Err(errors)
    }
}

fn field_errors(result: Result<(), ValidationErrors>, fields: FieldNames) -> Vec<FieldError> {
    let Err(errors) = result else {
        return Vec::new();
    };
    let by_field = errors.field_errors();

    fields
        .iter()
        .filter_map(|(name, wire_name)| by_field.get(*name).map(|errors| (*wire_name, *errors)))
        .flat_map(|(wire_name, errors)| {
            errors.iter().map(move |error| {
                let msg = error
                    .message
                    .as_ref()
                    .map_or_else(|| error.code.to_string(), ToString::to_string);
                FieldError::new(wire_name, msg)
            })
        })
        .collect()
}

fn field_position(fields: FieldNames, wire_name: &str) -> usize {
    fields
        .iter()
        .position(|(_, name)| *name == wire_name)
        .unwrap_or(fields.len())
}

#[cfg(test)]
mod tests {
    use crate::validation::{
        CommentRequest, FieldError, PostRequest, validate_comment, validate_post,
    };
    use time::macros::date;

    fn request(text: &str, founded_date: &str, location: &str) -> PostRequest {
        PostRequest {
            text: text.to_owned(),
            founded_date: founded_date.to_owned(),
            location: location.to_owned(),
        }
    }

    #[test]
    fn valid_post_passes() {
        let content = validate_post(request("lost wallet", "2024-01-01", "library")).unwrap();

        assert_eq!(content.text, "lost wallet");
        assert_eq!(content.founded_date, date!(2024-01-01));
        assert_eq!(content.location, "library");
    }

    #[test]
    fn every_failing_field_is_reported_in_order() {
        let errors = validate_post(PostRequest::default()).unwrap_err();

        assert_eq!(
            errors,
            [
                FieldError::new("text", "Text is required"),
                FieldError::new("foundedDate", "Founded date is required"),
                FieldError::new("location", "Location is required"),
            ]
        );
    }

    #[test]
    fn founded_date_must_be_a_calendar_date() {
        for bad in ["yesterday", "2024-02-30", "2024-13-01", "01/01/2024"] {
            let errors = validate_post(request("wallet", bad, "library")).unwrap_err();
            assert_eq!(
                errors,
                [FieldError::new(
                    "foundedDate",
                    "Founded date must be a valid date"
                )]
            );
        }
    }

    #[test]
    fn invalid_date_sorts_between_other_fields() {
        let errors = validate_post(request("", "nope", "")).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|error| error.field).collect();

        assert_eq!(fields, ["text", "foundedDate", "location"]);
    }

    #[test]
    fn missing_fields_deserialize_as_empty() {
        let request: PostRequest = serde_json::from_str(r#"{"text":"wallet"}"#).unwrap();
        let errors = validate_post(request).unwrap_err();

        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "foundedDate");
    }

    #[test]
    fn comment_text_is_required() {
        assert_eq!(
            validate_comment(CommentRequest {
                text: "is it brown?".to_owned()
            }),
            Ok("is it brown?".to_owned())
        );
        assert_eq!(
            validate_comment(CommentRequest::default()),
            Err(vec![FieldError::new("text", "Text is required")])
        );
    }
}
