mod failures;
mod happy_path;
mod scheduling;
