use std::sync::Arc;

use rustyline::{history::MemHistory, Editor};
use serde::Deserialize;
use snafu::{ResultExt, Snafu};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::config::Config;
use crate::model::{CourseContext, CourseId, VideoId};
use crate::reporter::Reporter;
use crate::resume::ResumeStore;
use crate::session::{Notice, ProgressTracker, TrackerHandle, VideoSession};
use crate::storage::{Storage, StorageError};

mod parse;

pub use parse::{parse, ParseError};

pub struct Repl {
    inner: Editor<(), MemHistory>,
    message: Option<String>,
}

impl Repl {
    pub fn new() -> Result<Self, ReplError> {
        let config = rustyline::Config::default();
        let inner =
            rustyline::Editor::with_history(config, MemHistory::new()).context(RustylineSnafu)?;

        let repl = Self {
            inner,
            message: None,
        };
        Ok(repl)
    }

    pub async fn prompt(&mut self) -> Action {
        let message = self
            .message
            .as_ref()
            .map(|msg| format!("  {msg}\n"))
            .unwrap_or_default();
        let prompt = format!("{}wisentia> ", message);

        let Ok(input) = self.inner.readline(&prompt) else {
            return Action::Exit;
        };

        self.message = None;

        self.inner.add_history_entry(input.clone()).ok();

        match parse::parse(&input) {
            Ok(action) => action,
            Err(err) => {
                self.reply(err.to_string());
                Action::None
            }
        }
    }

    pub fn reply(&mut self, message: String) {
        if let Some(msg) = self.message.as_mut() {
            msg.push_str("\n  ");
            msg.push_str(&message);
        } else {
            self.message = Some(message);
        }
    }
}

/// `open {"video_id": "12", "duration": 300, "course": {"course_id": "3", "videos": ["11", "12"]}}`
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OpenVideo {
    pub video_id: VideoId,
    /// seconds
    pub duration: f64,
    #[serde(default)]
    pub course: Option<OpenCourse>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OpenCourse {
    pub course_id: CourseId,
    #[serde(default)]
    pub videos: Vec<VideoId>,
}

impl OpenVideo {
    fn course_context(&self) -> Option<CourseContext> {
        self.course.as_ref().map(|course| CourseContext {
            course_id: course.course_id.clone(),
            current: self.video_id.clone(),
            videos: course.videos.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Action {
    Login {
        access: String,
        refresh: Option<String>,
    },
    Open {
        option: OpenVideo,
    },
    Ended,
    Complete,
    Status,
    Resume {
        course_id: CourseId,
    },
    Close,
    Exit,
    None,
}

#[derive(Debug, Snafu)]
pub enum ReplError {
    #[snafu(display("failed to initialize REPL: {}", source))]
    Rustyline {
        source: rustyline::error::ReadlineError,
    },

    #[snafu(transparent)]
    Storage { source: StorageError },
}

struct Active {
    tracker: TrackerHandle,
    notices: UnboundedReceiver<Notice>,
}

pub async fn start(
    repl: &mut Repl,
    config: &Config,
    reporter: Reporter,
    storage: Arc<dyn Storage>,
) -> Result<(), ReplError> {
    tracing::info!(api = %config.api_url, "starting REPL");

    let resume = ResumeStore::new(storage);
    let mut active: Option<Active> = None;

    loop {
        if let Some(active) = active.as_mut() {
            while let Ok(notice) = active.notices.try_recv() {
                repl.reply(notice.to_string());
            }
        }

        match repl.prompt().await {
            Action::Exit => break,
            Action::Login { access, refresh } => {
                reporter.guard().login(access, refresh)?;
                repl.reply("stored credentials".to_string());
            }
            Action::Open { option } => {
                if let Some(previous) = active.take() {
                    previous.tracker.shutdown().await;
                }

                let now = reporter.clock().now();
                let previous = match reporter.fetch_view(&option.video_id).await {
                    Some(view) => Some(view),
                    None => option.course.as_ref().and_then(|course| {
                        resume
                            .load(&course.course_id, now)?
                            .view_of(&option.video_id)
                    }),
                };
                let session = VideoSession::new(
                    option.video_id.clone(),
                    option.duration,
                    previous,
                    option.course_context(),
                    now,
                );
                repl.reply(format!(
                    "opened video `{}`, resuming at {:.0}s",
                    option.video_id,
                    session.position()
                ));

                let (tracker, notices) = ProgressTracker::spawn(
                    session,
                    reporter.clone(),
                    config.ticker(),
                    Some(resume.clone()),
                );
                active = Some(Active { tracker, notices });
            }
            Action::Ended => match &active {
                Some(active) => active.tracker.ended(),
                None => repl.reply("no video is open".to_string()),
            },
            Action::Complete => match &active {
                Some(active) => {
                    let outcome = active.tracker.mark_complete().await;
                    repl.reply(outcome.to_string());
                }
                None => repl.reply("no video is open".to_string()),
            },
            Action::Status => {
                let snapshot = match &active {
                    Some(active) => active.tracker.snapshot().await,
                    None => None,
                };

                match snapshot.map(|s| serde_json::to_string_pretty(&s)) {
                    Some(Ok(text)) => repl.reply(text),
                    Some(Err(error)) => repl.reply(format!("cannot show status: {error}")),
                    None => repl.reply("no video is open".to_string()),
                }
            }
            Action::Resume { course_id } => match resume.load(&course_id, reporter.clock().now()) {
                Some(entry) => repl.reply(format!(
                    "course `{}`: continue video `{}` at {:.0}s (saved {})",
                    course_id, entry.last_video_id, entry.position, entry.timestamp
                )),
                None => repl.reply(format!("nothing to resume for course `{course_id}`")),
            },
            Action::Close => match active.take() {
                Some(active) => {
                    let video_id = active.tracker.video_id().clone();
                    active.tracker.shutdown().await;
                    repl.reply(format!("closed video `{video_id}`"));
                }
                None => repl.reply("no video is open".to_string()),
            },
            _ => continue,
        }
    }

    if let Some(active) = active.take() {
        active.tracker.shutdown().await;
    }

    Ok(())
}
