use crate::model::VideoViewState;

/// Starting inside this many seconds of the end counts as "at the end".
pub const END_MARGIN_SECS: f64 = 10.0;
/// How far back from the end a viewer who was at the end resumes.
pub const REWIND_SECS: f64 = 30.0;

/// Where playback should start when a video is (re)opened.
///
/// An explicit last position wins over the watched percentage. A start that
/// would drop the viewer into the last [END_MARGIN_SECS] is pulled back to
/// [REWIND_SECS] before the end.
pub fn resume_position(previous: Option<&VideoViewState>, duration: f64) -> f64 {
    if !duration.is_finite() || duration <= 0.0 {
        return 0.0;
    }

    let position = previous.map_or(0.0, |view| {
        if view.last_position.is_finite() && view.last_position > 0.0 {
            view.last_position
        } else {
            (f64::from(view.watched_percentage) * duration / 100.0).floor()
        }
    });

    if position > duration - END_MARGIN_SECS {
        return (duration - REWIND_SECS).max(0.0);
    }

    position.clamp(0.0, duration)
}
