//! `mirror render`: transcode text without sending it anywhere.

use anyhow::Result;
use clap::Parser;
use mirror_markup::{MentionTable, ast, transcode};

/// Arguments for the render command.
#[derive(Debug, Parser)]
pub struct RenderArgs {
    /// Discord-flavored text to transcode
    pub text: String,

    /// Print the parsed AST as JSON instead of MarkdownV2
    #[arg(long)]
    pub ast: bool,
}

/// Output of the command, using `names` to resolve mentions.
pub fn render(args: &RenderArgs, names: &MentionTable) -> Result<String> {
    if args.ast {
        Ok(serde_json::to_string_pretty(&ast(&args.text, names))?)
    } else {
        Ok(transcode(&args.text, names))
    }
}
