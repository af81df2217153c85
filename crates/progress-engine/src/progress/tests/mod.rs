mod aggregate;
mod common;
mod penalty;
