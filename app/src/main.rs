//! ndilink command line entry point.

use clap::Parser;

use ndilink_app::Options;

fn main() -> anyhow::Result<()> {
    ndilink_app::run(Options::parse())
}
