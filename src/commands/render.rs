//! Render command implementation
//!
//! Applies a stream of watch events to an empty rule file and prints the
//! result, without checking or publishing anything.

use crate::cli::args::{RenderArgs, RenderOutput};
use crate::config::ConfigBuilder;
use crate::domain::EntityDescriptor;
use crate::error::Result;
use crate::events::{translate, EventStream, StreamItem};
use crate::rules::{RuleDocument, RuleTemplate};
use crate::services::materializer::apply_all;

use std::fs::File;
use std::io::{self, BufReader, Read, Write};

/// Execute the render command
pub fn run_render(args: &RenderArgs, config_path: Option<&str>) -> Result<()> {
    let config = ConfigBuilder::new().with_file(config_path).build()?;

    let document = match &args.events {
        Some(path) => render(BufReader::new(File::open(path)?), &config.template)?,
        None => render(io::stdin().lock(), &config.template)?,
    };

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    match args.output {
        RenderOutput::Rules => write!(handle, "{}", document.render())?,
        RenderOutput::Keys => {
            for key in document.keys() {
                writeln!(handle, "{}", key)?;
            }
        }
    }

    Ok(())
}

/// Build the document a stream of events produces from a fresh rule file
pub fn render<R: Read>(reader: R, template: &RuleTemplate) -> Result<RuleDocument> {
    let mut entities: Vec<EntityDescriptor> = Vec::new();
    for item in EventStream::new(reader) {
        match item? {
            StreamItem::Event(event) => entities.extend(translate(&event)),
            StreamItem::Malformed(e) => log::warn!("Skipping malformed event: {}", e),
        }
    }

    let mut document = RuleDocument::new();
    let summary = apply_all(&mut document, &entities, template);
    log::debug!(
        "Rendered {} rules from {} entities ({} skipped)",
        document.len(),
        summary.drained,
        summary.skipped
    );

    Ok(document)
}
