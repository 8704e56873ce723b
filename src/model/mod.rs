pub use course::*;
pub use timestamp::*;
pub use video_id::*;
pub use view_state::*;

mod course;
mod timestamp;
mod video_id;
mod view_state;
