pub mod bootstrap;
pub mod cleanup;
pub mod doctor;
pub mod init;
pub mod notes;
pub mod run;
pub mod send;
pub mod status;
