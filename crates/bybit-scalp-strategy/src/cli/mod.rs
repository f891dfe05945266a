/*
[INPUT]:  CLI submodules
[OUTPUT]: Command implementations for the binary
[POS]:    CLI layer - module wiring
[UPDATE]: When adding subcommands
*/

pub mod init;
