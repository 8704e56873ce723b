use snafu::{ensure, Snafu};

use crate::define_id;

define_id!(VideoId, "video");
define_id!(CourseId, "course");

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum ParseIdError {
    #[snafu(display("{kind} id cannot be empty"))]
    EmptyId { kind: &'static str },

    #[snafu(display("{kind} id `{text}` contains characters that are not allowed in a path"))]
    UnsafeId { kind: &'static str, text: String },
}

pub fn validate_id<'a>(input: &'a str, kind: &'static str) -> Result<&'a str, ParseIdError> {
    let input = input.trim();
    ensure!(!input.is_empty(), EmptyIdSnafu { kind });

    let unsafe_char = |c: char| c.is_whitespace() || matches!(c, '/' | '\\' | '?' | '#' | '%');
    ensure!(
        !input.contains(unsafe_char),
        UnsafeIdSnafu { kind, text: input }
    );
    ensure!(
        !matches!(input, "." | ".."),
        UnsafeIdSnafu { kind, text: input }
    );

    Ok(input)
}
