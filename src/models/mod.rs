pub mod club;
pub mod enrollment;
pub mod semester;
pub mod student;

pub use club::Club;
pub use enrollment::EnrollmentRow;
pub use semester::Semester;
pub use student::{NewStudent, Student};
