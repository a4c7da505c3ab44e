pub mod attempt;
pub mod submission;

pub use attempt::{AttemptOrigin, AttemptRecord, NewAttempt};
pub use submission::{DeliveryState, FormType, NewSubmission, Submission, SubmissionUpdate};
