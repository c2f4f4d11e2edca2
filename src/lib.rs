pub mod cli;
pub mod config;
pub mod corpus;
pub mod dataset;
pub mod dna;
pub mod fold;
pub mod gateway;
pub mod logging;
pub mod pipeline;
pub mod registry;
pub mod runner;
pub mod score;
pub mod trace;
