pub mod profiles;
pub mod run;

// Re-export all the command structs
pub use profiles::ProfilesArgs;
pub use run::RunArgs;
