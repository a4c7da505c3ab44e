pub mod intake;
pub mod validator;

pub use intake::{IntakeTicket, SubmissionIntake};
pub use validator::{RequiredFieldsValidator, Validator};
