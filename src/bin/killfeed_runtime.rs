//! Production ingestion runtime
//!
//! Registry-driven incremental scheduler: every registered server across
//! every guild gets one killfeed pass per interval. Same wiring as the
//! library entry point; kept as its own binary so deployments have a stable
//! target name.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    deadfeed::main()
}
