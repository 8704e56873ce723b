use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::instrument;

use crate::api::TrackResponse;
use crate::clock::Ticker;
use crate::estimator::resume_position;
use crate::model::{
    clamp_percentage, CourseContext, CourseProgress, Timestamp, VideoId, VideoViewState,
};
use crate::progress::{self, ProgressGate};
use crate::reporter::{ProgressUpdate, ReportOutcome, Reporter};
use crate::resume::{CourseResume, ResumeStore};

/// Everything the tracker knows about one open video.
///
/// The session is plain state: it decides what to report and folds responses
/// back in, but never talks to the network itself.
#[derive(Debug, Clone)]
pub struct VideoSession {
    video_id: VideoId,
    duration: f64,
    elapsed: f64,
    started_at: Timestamp,
    gate: ProgressGate,
    view: Option<VideoViewState>,
    course: Option<CourseContext>,
    course_progress: Option<CourseProgress>,
}

impl VideoSession {
    pub fn new(
        video_id: VideoId,
        duration: f64,
        previous: Option<VideoViewState>,
        course: Option<CourseContext>,
        now: Timestamp,
    ) -> Self {
        let duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
        let previous = previous.map(|view| view.with_duration(duration));
        let elapsed = resume_position(previous.as_ref(), duration);

        Self {
            video_id,
            duration,
            elapsed,
            started_at: now,
            gate: ProgressGate::default(),
            view: previous,
            course,
            course_progress: None,
        }
    }

    pub fn video_id(&self) -> &VideoId {
        &self.video_id
    }

    pub fn position(&self) -> f64 {
        self.elapsed
    }

    pub fn percentage(&self) -> u8 {
        progress::percentage(self.elapsed, self.duration)
    }

    /// One tick of the passive estimate. Returns the update to send, if any.
    pub fn advance(&mut self, by: Duration, now: Timestamp) -> Option<ProgressUpdate> {
        self.elapsed = (self.elapsed + by.as_secs_f64()).min(self.duration);
        self.passive_update(now)
    }

    /// The player reported the end of the video.
    pub fn ended(&mut self, now: Timestamp) -> Option<ProgressUpdate> {
        self.elapsed = self.duration;
        self.passive_update(now)
    }

    /// The "mark complete" update, sent regardless of the estimate.
    pub fn completion(&mut self, now: Timestamp) -> ProgressUpdate {
        self.elapsed = self.duration;
        self.gate.record(100);

        ProgressUpdate {
            watched_percentage: 100,
            is_completed: true,
            last_position: self.duration,
            view_duration: self.view_duration(now),
        }
    }

    fn passive_update(&mut self, now: Timestamp) -> Option<ProgressUpdate> {
        // nothing to estimate until the player knows the duration
        if self.duration <= 0.0 {
            return None;
        }

        let percentage = self.percentage();
        if !self.gate.admit(percentage) {
            return None;
        }

        Some(ProgressUpdate {
            watched_percentage: percentage,
            is_completed: progress::is_completed(percentage),
            last_position: self.elapsed,
            view_duration: self.view_duration(now),
        })
    }

    fn view_duration(&self, now: Timestamp) -> u64 {
        (now - self.started_at).num_milliseconds().max(0) as u64
    }

    /// Fold a successful report into the view and course state.
    pub fn apply(&mut self, update: &ProgressUpdate, response: &TrackResponse, now: Timestamp) {
        let was_completed = self.view.as_ref().is_some_and(|view| view.is_completed);

        self.view = Some(VideoViewState::new(
            self.video_id.clone(),
            f64::from(update.watched_percentage),
            update.is_completed || was_completed,
            update.last_position,
            update.view_duration,
            now,
        ));

        if let Some(completion) = response.course_completion_percentage {
            let completion_percentage = clamp_percentage(completion);
            self.course_progress = Some(CourseProgress {
                completion_percentage,
                is_completed: response
                    .course_completed
                    .unwrap_or(completion_percentage >= 100),
                last_video_id: self.video_id.clone(),
                last_access_date: now,
            });
        } else if let Some(course) = self.course.as_ref().filter(|_| update.is_completed) {
            self.course_progress = Some(CourseProgress::local_fallback(course, now));
        }
    }

    pub fn resume_entry(&self, now: Timestamp) -> Option<(&CourseContext, CourseResume)> {
        let course = self.course.as_ref()?;
        let resume = CourseResume::new(self.video_id.clone(), now, self.elapsed);
        Some((course, resume))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            video_id: self.video_id.clone(),
            duration: self.duration,
            position: self.elapsed,
            percentage: self.percentage(),
            last_reported: self.gate.last_emitted(),
            view: self.view.clone(),
            course_progress: self.course_progress.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub video_id: VideoId,
    pub duration: f64,
    pub position: f64,
    pub percentage: u8,
    pub last_reported: Option<u8>,
    pub view: Option<VideoViewState>,
    pub course_progress: Option<CourseProgress>,
}

/// Something the viewer should be told about.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub video_id: VideoId,
    pub percentage: u8,
    pub outcome: ReportOutcome,
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[video {} at {}%] {}", self.video_id, self.percentage, self.outcome)
    }
}

#[derive(Debug, Clone, Copy)]
struct Quit;

enum Command {
    Ended,
    MarkComplete {
        reply: oneshot::Sender<ReportOutcome>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Resolved {
        update: ProgressUpdate,
        outcome: ReportOutcome,
        reply: Option<oneshot::Sender<ReportOutcome>>,
    },
}

/// Control side of a running [ProgressTracker] task.
#[derive(Debug)]
pub struct TrackerHandle {
    video_id: VideoId,
    commands: mpsc::UnboundedSender<Command>,
    quit: oneshot::Sender<Quit>,
    handle: tokio::task::JoinHandle<SessionSnapshot>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Ended => f.write_str("Ended"),
            Command::MarkComplete { .. } => f.write_str("MarkComplete"),
            Command::Snapshot { .. } => f.write_str("Snapshot"),
            Command::Resolved { update, outcome, .. } => f
                .debug_struct("Resolved")
                .field("update", update)
                .field("outcome", outcome)
                .finish(),
        }
    }
}

impl TrackerHandle {
    pub fn video_id(&self) -> &VideoId {
        &self.video_id
    }

    /// Signal the end of the video.
    pub fn ended(&self) {
        let _ = self.commands.send(Command::Ended);
    }

    /// Report the video as fully watched and wait for the outcome.
    pub async fn mark_complete(&self) -> ReportOutcome {
        let (reply, outcome) = oneshot::channel();
        if self.commands.send(Command::MarkComplete { reply }).is_err() {
            return stopped();
        }

        outcome.await.unwrap_or_else(|_| stopped())
    }

    pub async fn snapshot(&self) -> Option<SessionSnapshot> {
        let (reply, snapshot) = oneshot::channel();
        self.commands.send(Command::Snapshot { reply }).ok()?;
        snapshot.await.ok()
    }

    /// Stop the ticker without waiting for the task to wind down.
    pub fn stop(self) {
        let _ = self.quit.send(Quit);
    }

    /// Stop the ticker and return the final state of the session.
    pub async fn shutdown(self) -> Option<SessionSnapshot> {
        let _ = self.quit.send(Quit);
        self.handle.await.ok()
    }
}

fn stopped() -> ReportOutcome {
    ReportOutcome::FatalError {
        message: "tracker stopped".to_string(),
    }
}

/// The passive tracking loop for one video.
///
/// Each report runs as its own task so a slow backend never holds up the
/// ticker. Responses are applied in the order they resolve. Once the tracker
/// stops, responses still in flight are dropped.
pub struct ProgressTracker {
    session: VideoSession,
    reporter: Reporter,
    resume: Option<ResumeStore>,
    notices: mpsc::UnboundedSender<Notice>,
    commands: mpsc::UnboundedSender<Command>,
}

impl ProgressTracker {
    pub fn spawn(
        session: VideoSession,
        reporter: Reporter,
        ticker: impl Ticker + 'static,
        resume: Option<ResumeStore>,
    ) -> (TrackerHandle, mpsc::UnboundedReceiver<Notice>) {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (notices, notice_rx) = mpsc::unbounded_channel();
        let (quit, quit_rx) = oneshot::channel();
        let video_id = session.video_id().clone();

        let tracker = Self {
            session,
            reporter,
            resume,
            notices,
            commands: commands.clone(),
        };
        let handle = tokio::spawn(tracker.run(ticker, command_rx, quit_rx));

        let handle = TrackerHandle {
            video_id,
            commands,
            quit,
            handle,
        };
        (handle, notice_rx)
    }

    #[instrument(skip_all, fields(video_id = %self.session.video_id))]
    async fn run(
        mut self,
        mut ticker: impl Ticker,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut quit: oneshot::Receiver<Quit>,
    ) -> SessionSnapshot {
        tracing::info!(
            position = self.session.position(),
            duration = self.session.duration,
            "started progress tracking"
        );

        loop {
            tokio::select! {
                biased;

                _ = &mut quit => break,

                Some(command) = commands.recv() => self.handle(command),

                elapsed = ticker.tick() => {
                    let now = self.reporter.clock().now();
                    if let Some(update) = self.session.advance(elapsed, now) {
                        self.submit(update, None);
                    }
                }
            }
        }

        self.save_resume();
        tracing::info!(position = self.session.position(), "stopped progress tracking");
        self.session.snapshot()
    }

    fn handle(&mut self, command: Command) {
        let now = self.reporter.clock().now();

        match command {
            Command::Ended => {
                if let Some(update) = self.session.ended(now) {
                    self.submit(update, None);
                }
            }
            Command::MarkComplete { reply } => {
                let update = self.session.completion(now);
                self.submit(update, Some(reply));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.session.snapshot());
            }
            Command::Resolved {
                update,
                outcome,
                reply,
            } => {
                if let ReportOutcome::Success(response) = &outcome {
                    self.session.apply(&update, response, now);
                }

                let _ = self.notices.send(Notice {
                    video_id: self.session.video_id.clone(),
                    percentage: update.watched_percentage,
                    outcome: outcome.clone(),
                });

                if let Some(reply) = reply {
                    let _ = reply.send(outcome);
                }
            }
        }
    }

    fn submit(&self, update: ProgressUpdate, reply: Option<oneshot::Sender<ReportOutcome>>) {
        self.save_resume();

        let reporter = self.reporter.clone();
        let commands = self.commands.clone();
        let video_id = self.session.video_id.clone();

        tokio::spawn(async move {
            let outcome = reporter.report(&video_id, update).await;
            let _ = commands.send(Command::Resolved {
                update,
                outcome,
                reply,
            });
        });
    }

    fn save_resume(&self) {
        let Some(store) = &self.resume else { return };
        let now = self.reporter.clock().now();
        let Some((course, resume)) = self.session.resume_entry(now) else {
            return;
        };

        if let Err(error) = store.save(&course.course_id, &resume) {
            tracing::warn!(%error, course_id = %course.course_id, "could not save course resume state");
        }
    }
}
