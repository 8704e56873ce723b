use super::*;
use chumsky::{error::SimpleReason, prelude::*, text::whitespace};
use itertools::Itertools;

#[derive(Debug, Snafu)]
#[snafu(display("cannot parse '{input}' - {}", self.combine_errors("\n")))]
pub struct ParseError {
    input: String,
    errors: Vec<Simple<char>>,
}

impl ParseError {
    fn combine_errors(&self, separator: &str) -> String {
        self.errors
            .iter()
            .map(|err| {
                format!(
                    "{}:\n   {}",
                    err,
                    match err.reason() {
                        SimpleReason::Custom(msg) => format!("error {}", msg),
                        SimpleReason::Unexpected => "unexpected input".to_string(),
                        SimpleReason::Unclosed { span, delimiter } => {
                            format!(
                                "unclosed delimiter ({}..{}) in {}",
                                span.start, span.end, delimiter
                            )
                        }
                    }
                )
            })
            .join(separator)
    }
}

pub fn parse(input: &str) -> Result<Action, ParseError> {
    let action = program().parse(input.trim()).map_err(|errors| ParseError {
        input: input.to_string(),
        errors,
    })?;

    Ok(action)
}

fn program() -> impl Parser<char, Action, Error = Simple<char>> {
    action_login()
        .or(action_open())
        .or(action_resume())
        .or(action_keyword())
        .then_ignore(end())
}

fn action_login() -> impl Parser<char, Action, Error = Simple<char>> {
    just("login")
        .then_ignore(whitespace().at_least(1))
        .ignore_then(word())
        .then(whitespace().at_least(1).ignore_then(word()).or_not())
        .map(|(access, refresh)| Action::Login { access, refresh })
}

fn action_open() -> impl Parser<char, Action, Error = Simple<char>> {
    just("open")
        .then_ignore(whitespace().at_least(1))
        .ignore_then(video_content())
        .map(|option| Action::Open { option })
}

fn action_resume() -> impl Parser<char, Action, Error = Simple<char>> {
    just("resume")
        .then_ignore(whitespace().at_least(1))
        .ignore_then(course_descriptor())
        .map(|course_id| Action::Resume { course_id })
}

fn action_keyword() -> impl Parser<char, Action, Error = Simple<char>> {
    choice((
        just("ended").to(Action::Ended),
        just("complete").to(Action::Complete),
        just("status").to(Action::Status),
        just("close").to(Action::Close),
        just("exit").to(Action::Exit),
        just("quit").to(Action::Exit),
    ))
}

fn word() -> impl Parser<char, String, Error = Simple<char>> {
    filter(|c: &char| !c.is_whitespace())
        .repeated()
        .at_least(1)
        .collect::<String>()
}

fn course_descriptor() -> impl Parser<char, CourseId, Error = Simple<char>> {
    word().try_map(|text, span| {
        text.parse()
            .map_err(|err: crate::model::ParseIdError| Simple::custom(span, err.to_string()))
    })
}

fn video_content() -> impl Parser<char, OpenVideo, Error = Simple<char>> {
    take_until(end()).try_map(|(chars, _), span| {
        let str = chars.into_iter().collect::<String>();
        serde_json::from_str(&str)
            .map_err(|source| Simple::custom(span, format!("invalid video content: {}", source)))
    })
}
