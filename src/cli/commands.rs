use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pt", about = concat!("plantree v", env!("CARGO_PKG_VERSION"), " - brain dump in, task tree out"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different workspace directory
    #[arg(short = 'C', long = "workspace-dir", global = true)]
    pub workspace_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a .plantree/ workspace in the current directory
    Init(InitArgs),
    /// Show or change workspace settings
    Config(ConfigCmd),
    /// Show the current task tree
    Show(ShowArgs),
    /// Validate the current task tree
    Check,
    /// Turn a brain dump into a task tree
    Generate(GenerateArgs),
    /// Break the tree down further
    Refine(RefineArgs),
    /// Add a category, project, task or subtask
    Add(AddArgs),
    /// Remove a node and everything under it
    Rm(PathArg),
    /// Rename a node
    Rename(RenameArgs),
    /// Set or clear a node's emoji
    Emoji(EmojiArgs),
    /// Edit a node's dependency notes
    Dep(DepCmd),
    /// Flag a task or subtask for breakdown
    Flag(FlagArgs),
    /// Flag (or unflag) every task and subtask
    FlagAll(FlagAllArgs),
    /// Replace the tree with edited JSON
    Apply(ApplyArgs),
    /// Discard the current tree
    Clear,
    /// Save the current tree, replacing any saved tree
    Save,
    /// Make the saved tree current
    Load,
    /// Delete the saved tree, its progress and its to-do lists
    DeleteSaved(DeleteSavedArgs),
    /// Show the saved tree with completion marks
    View,
    /// Check off a node of the saved tree (cascades to descendants)
    Complete(CompleteArgs),
    /// Manage to-do lists
    Todo(TodoCmd),
    /// Write the tree to a text file
    Export(ExportArgs),
    /// Read handwritten text from an image
    Ocr(OcrArgs),
    /// Check that the backend is up
    Health,
    /// View or manage the recovery log
    Recovery(RecoveryCmd),
}

// ---------------------------------------------------------------------------
// Workspace
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct InitArgs {
    /// Backend base URL (default: http://localhost:8000)
    #[arg(long)]
    pub backend_url: Option<String>,
    /// Reinitialize even if .plantree/ already exists
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct ConfigCmd {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration (default)
    Show,
    /// Set a value (an empty value clears optional keys)
    Set(ConfigSetArgs),
}

#[derive(Args)]
pub struct ConfigSetArgs {
    /// Dotted key, e.g. backend.url
    pub key: String,
    pub value: String,
}

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ShowArgs {
    /// Print the JSON form instead of the summary
    #[arg(long)]
    pub raw: bool,
    /// Print node paths next to names
    #[arg(long)]
    pub paths: bool,
}

#[derive(Args)]
pub struct GenerateArgs {
    /// Brain dump text (repeatable)
    pub text: Vec<String>,
    /// Read a brain dump from a text file (repeatable)
    #[arg(long = "file", value_name = "PATH")]
    pub files: Vec<String>,
    /// Read handwriting from an image and use it as a brain dump (repeatable)
    #[arg(long = "image", value_name = "PATH")]
    pub images: Vec<String>,
    /// Extra context for the backend
    #[arg(long)]
    pub context: Option<String>,
    /// Ignore the current tree and start fresh
    #[arg(long)]
    pub fresh: bool,
}

#[derive(Args)]
pub struct RefineArgs {
    /// Only send what is flagged for breakdown and merge the reply back
    #[arg(long)]
    pub selected: bool,
}

#[derive(Args)]
pub struct PathArg {
    /// Node path, e.g. 0.1.2 (category.project.task)
    pub path: String,
}

#[derive(Args)]
pub struct AddArgs {
    /// Name of the new node
    pub name: String,
    /// Parent path (omit to add a category)
    #[arg(long)]
    pub under: Option<String>,
    /// Insert first instead of last
    #[arg(long, conflicts_with = "at")]
    pub top: bool,
    /// Insert at this 0-based position
    #[arg(long)]
    pub at: Option<usize>,
}

#[derive(Args)]
pub struct RenameArgs {
    pub path: String,
    pub name: String,
}

#[derive(Args)]
pub struct EmojiArgs {
    pub path: String,
    /// New emoji (omit to clear)
    pub emoji: Option<String>,
}

#[derive(Args)]
pub struct DepCmd {
    #[command(subcommand)]
    pub action: DepAction,
}

#[derive(Subcommand)]
pub enum DepAction {
    /// Append a dependency note
    Add(DepAddArgs),
    /// Replace the dependency at INDEX
    Edit(DepEditArgs),
    /// Remove the dependency at INDEX
    Rm(DepRmArgs),
}

#[derive(Args)]
pub struct DepAddArgs {
    pub path: String,
    pub text: String,
}

#[derive(Args)]
pub struct DepEditArgs {
    pub path: String,
    /// 0-based dependency index
    pub index: usize,
    pub text: String,
}

#[derive(Args)]
pub struct DepRmArgs {
    pub path: String,
    /// 0-based dependency index
    pub index: usize,
}

#[derive(Args)]
pub struct FlagArgs {
    pub path: String,
    /// Clear the flag instead
    #[arg(long)]
    pub off: bool,
}

#[derive(Args)]
pub struct FlagAllArgs {
    /// Clear every flag instead
    #[arg(long)]
    pub off: bool,
}

#[derive(Args)]
pub struct ApplyArgs {
    /// JSON file to apply, or - for stdin
    pub file: String,
}

#[derive(Args)]
pub struct DeleteSavedArgs {
    /// Skip the confirmation prompt
    #[arg(long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct CompleteArgs {
    /// Node id, or path for nodes without one
    pub key: String,
    /// Uncheck instead
    #[arg(long)]
    pub off: bool,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Export the saved tree instead of the current one
    #[arg(long)]
    pub saved: bool,
    /// Write to this file instead of a generated name
    #[arg(long, short)]
    pub output: Option<String>,
}

#[derive(Args)]
pub struct OcrArgs {
    /// Image file
    pub image: String,
}

// ---------------------------------------------------------------------------
// To-do lists
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct TodoCmd {
    #[command(subcommand)]
    pub action: Option<TodoAction>,
}

#[derive(Subcommand)]
pub enum TodoAction {
    /// List saved to-do lists (default)
    List,
    /// Create a list from nodes of the saved tree
    New(TodoNewArgs),
    /// Ask the backend for a list
    Ai(TodoAiArgs),
    /// Show a list with completion marks
    Show(TodoIdArg),
    /// Write a list to a text file
    Export(TodoExportArgs),
    /// Delete a list
    Rm(TodoIdArg),
}

#[derive(Args)]
pub struct TodoNewArgs {
    /// List name
    pub name: String,
    /// Paths to include; checking a node includes everything under it
    #[arg(required = true)]
    pub paths: Vec<String>,
}

#[derive(Args)]
pub struct TodoAiArgs {
    /// List name
    pub name: String,
    /// Extra instructions for the backend
    #[arg(long)]
    pub prompt: Option<String>,
}

#[derive(Args)]
pub struct TodoIdArg {
    pub id: i64,
}

#[derive(Args)]
pub struct TodoExportArgs {
    pub id: i64,
    /// Write to this file instead of a generated name
    #[arg(long, short)]
    pub output: Option<String>,
}

// ---------------------------------------------------------------------------
// Recovery log
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct RecoveryCmd {
    #[command(subcommand)]
    pub action: Option<RecoveryAction>,
    /// Maximum number of entries to show (default: 10)
    #[arg(long)]
    pub limit: Option<usize>,
    /// Show entries after this timestamp (ISO-8601)
    #[arg(long)]
    pub since: Option<String>,
}

#[derive(Subcommand)]
pub enum RecoveryAction {
    /// Remove old entries
    Prune(RecoveryPruneArgs),
    /// Print the absolute path to the recovery log
    Path,
}

#[derive(Args)]
pub struct RecoveryPruneArgs {
    /// Remove entries older than this timestamp (default: 30 days ago)
    #[arg(long)]
    pub before: Option<String>,
    /// Remove all entries
    #[arg(long)]
    pub all: bool,
}
