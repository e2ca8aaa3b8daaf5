pub(crate) mod exams;
pub(crate) mod questions;
pub(crate) mod subjects;
pub(crate) mod submissions;
pub(crate) mod users;
