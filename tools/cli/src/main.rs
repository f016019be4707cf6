//! passvault CLI - Command line interface for password vaults.
//!
//! Each invocation opens the vault, performs one operation, saves it and,
//! when replication is set up with sync-on-save, copies it to the mirror.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;
use zeroize::Zeroizing;

use passvault_common::{GroupPath, LoadFailure};
use passvault_crypto::KdfParams;
use passvault_policy::{CharacterClasses, PasswordPolicy, PolicyStyle};
use passvault_storage::create_default_registry;
use passvault_sync::{ReplicationEngine, SyncResult, SyncTrigger};
use passvault_vault::{
    list_backups, EntryRequest, JsonSettingsStore, SessionEvent, Settings, SettingsStore,
    StaticSettings, VaultSession,
};

#[derive(Parser)]
#[command(name = "passvault")]
#[command(about = "passvault - Encrypted password vault")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file (default: the platform config directory).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new vault file.
    Init {
        vault: PathBuf,

        /// KDF strength: "interactive", "moderate", or "sensitive".
        #[arg(short, long, default_value = "interactive")]
        strength: String,
    },

    /// List groups and entries.
    List {
        vault: PathBuf,

        /// Only show entries in this group and its subgroups.
        #[arg(short, long)]
        group: Option<String>,
    },

    /// Add an entry.
    Add {
        vault: PathBuf,
        title: String,

        #[arg(short, long)]
        username: Option<String>,

        #[arg(long)]
        url: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        /// Dotted group path.
        #[arg(short, long)]
        group: Option<String>,

        /// Policy the password must satisfy.
        #[arg(short, long)]
        policy: Option<String>,

        /// Generate the password instead of prompting for it.
        #[arg(long)]
        generate: bool,
    },

    /// Remove an entry by its list index.
    Remove { vault: PathBuf, index: usize },

    /// Create an empty group.
    Mkgroup { vault: PathBuf, group: String },

    /// Rename a group and everything below it.
    RenameGroup {
        vault: PathBuf,
        old: String,
        new: String,
    },

    /// Delete a group that holds no entries.
    Rmgroup { vault: PathBuf, group: String },

    /// Move an entry to another group.
    Move {
        vault: PathBuf,
        index: usize,
        group: String,
    },

    /// Create or update a password policy.
    PolicySet(PolicyArgs),

    /// Set or clear the default password policy.
    PolicyDefault {
        vault: PathBuf,

        /// Policy name; omit to clear the default.
        name: Option<String>,
    },

    /// Generate a password from a vault policy.
    Generate {
        vault: PathBuf,

        #[arg(short, long)]
        policy: Option<String>,
    },

    /// List backups of a vault file.
    Backups { vault: PathBuf },

    /// Change the vault passphrase.
    ChangePassphrase { vault: PathBuf },

    /// Copy the vault to its configured mirror.
    Sync {
        vault: PathBuf,

        /// Overwrite the mirror even if it is newer.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args)]
struct PolicyArgs {
    vault: PathBuf,
    name: String,

    /// Existing policy to update; it is renamed to NAME.
    #[arg(long)]
    rename_from: Option<String>,

    #[arg(short, long, default_value_t = 20)]
    length: usize,

    #[arg(long, value_enum, default_value_t = StyleArg::Standard)]
    style: StyleArg,

    /// Use lowercase letters. Without any class flag every class is used.
    #[arg(long)]
    lower: bool,

    #[arg(long)]
    upper: bool,

    #[arg(long)]
    digits: bool,

    #[arg(long)]
    special: bool,

    /// Skip easily confused characters.
    #[arg(long)]
    easy_vision: bool,

    #[arg(long, default_value_t = 0)]
    min_lower: usize,

    #[arg(long, default_value_t = 0)]
    min_upper: usize,

    #[arg(long, default_value_t = 0)]
    min_digits: usize,

    #[arg(long, default_value_t = 0)]
    min_special: usize,

    /// Symbol set replacing the built-in one.
    #[arg(long)]
    symbols: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StyleArg {
    Standard,
    Hex,
    Pronounceable,
}

impl PolicyArgs {
    fn to_policy(&self) -> PasswordPolicy {
        let classes = if self.lower || self.upper || self.digits || self.special {
            CharacterClasses {
                lowercase: self.lower,
                uppercase: self.upper,
                digits: self.digits,
                symbols: self.special,
                easy_vision: self.easy_vision,
            }
        } else {
            CharacterClasses {
                easy_vision: self.easy_vision,
                ..CharacterClasses::all()
            }
        };

        let style = match self.style {
            StyleArg::Standard => PolicyStyle::Standard(classes),
            StyleArg::Hex => PolicyStyle::HexOnly,
            StyleArg::Pronounceable => PolicyStyle::Pronounceable(classes),
        };

        let mut policy = PasswordPolicy::new(&self.name, self.length, style)
            .with_min_lowercase(self.min_lower)
            .with_min_uppercase(self.min_upper)
            .with_min_digits(self.min_digits)
            .with_min_symbols(self.min_special);
        if let Some(symbols) = &self.symbols {
            policy = policy.with_symbols(symbols.clone());
        }
        policy
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let app = App {
        settings: settings_store(cli.config),
        cancel,
    };

    match cli.command {
        Commands::Init { vault, strength } => app.cmd_init(&vault, &strength).await,
        Commands::List { vault, group } => app.cmd_list(&vault, group.as_deref()).await,
        Commands::Add {
            vault,
            title,
            username,
            url,
            notes,
            group,
            policy,
            generate,
        } => {
            let mut request = EntryRequest::new(title, "");
            request.username = username.unwrap_or_default();
            request.url = url.unwrap_or_default();
            request.notes = notes.unwrap_or_default();
            request.group = group.unwrap_or_default();
            request.policy_name = policy;
            app.cmd_add(&vault, request, generate).await
        }
        Commands::Remove { vault, index } => app.cmd_remove(&vault, index).await,
        Commands::Mkgroup { vault, group } => app.cmd_mkgroup(&vault, &group).await,
        Commands::RenameGroup { vault, old, new } => {
            app.cmd_rename_group(&vault, &old, &new).await
        }
        Commands::Rmgroup { vault, group } => app.cmd_rmgroup(&vault, &group).await,
        Commands::Move {
            vault,
            index,
            group,
        } => app.cmd_move(&vault, index, &group).await,
        Commands::PolicySet(args) => app.cmd_policy_set(&args).await,
        Commands::PolicyDefault { vault, name } => {
            app.cmd_policy_default(&vault, name.as_deref()).await
        }
        Commands::Generate { vault, policy } => app.cmd_generate(&vault, policy.as_deref()).await,
        Commands::Backups { vault } => cmd_backups(&vault).await,
        Commands::ChangePassphrase { vault } => app.cmd_change_passphrase(&vault).await,
        Commands::Sync { vault, force } => app.cmd_sync(&vault, force).await,
    }
}

fn settings_store(config: Option<PathBuf>) -> Arc<dyn SettingsStore> {
    match config.or_else(JsonSettingsStore::default_location) {
        Some(path) => {
            debug!(path = %path.display(), "Using settings file");
            Arc::new(JsonSettingsStore::new(path))
        }
        None => Arc::new(StaticSettings::new(Settings::default())),
    }
}

/// Prompt for a passphrase without echoing it.
fn prompt_passphrase(prompt: &str) -> Result<Zeroizing<String>> {
    let passphrase = rpassword::prompt_password(prompt).context("Failed to read passphrase")?;
    Ok(Zeroizing::new(passphrase))
}

/// Prompt twice and require both answers to match.
fn prompt_new_passphrase(prompt: &str) -> Result<Zeroizing<String>> {
    let passphrase = prompt_passphrase(prompt)?;
    let confirm = prompt_passphrase("Confirm: ")?;

    if *passphrase != *confirm {
        bail!("Passphrases do not match");
    }
    if passphrase.is_empty() {
        bail!("Passphrase cannot be empty");
    }
    Ok(passphrase)
}

fn group_label(group: &str) -> &str {
    if group.is_empty() {
        "(root)"
    } else {
        group
    }
}

fn report(result: &SyncResult) {
    if result.had_conflict {
        println!("Mirror copy is newer than the vault; it was left untouched.");
        println!("Run `passvault sync --force` to overwrite it.");
    } else if result.is_success {
        println!("Vault replicated.");
    } else {
        println!(
            "Replication failed: {}",
            result.error_message.as_deref().unwrap_or("unknown error")
        );
    }
}

struct App {
    settings: Arc<dyn SettingsStore>,
    cancel: CancellationToken,
}

impl App {
    async fn open(&self, path: &Path, read_only: bool) -> Result<VaultSession> {
        let passphrase = prompt_passphrase("Passphrase: ")?;
        let mut session = VaultSession::new(self.settings.clone());

        if let Err(e) = session
            .load(path, passphrase.as_bytes(), read_only, &self.cancel)
            .await
        {
            match e.load_failure() {
                LoadFailure::FileNotFound => bail!("Vault file not found: {}", path.display()),
                LoadFailure::InvalidPasswordOrFormat => {
                    bail!("Wrong passphrase or not a vault file")
                }
                LoadFailure::Unknown => return Err(e).context("Failed to open vault"),
            }
        }
        Ok(session)
    }

    /// Build the engine described by the settings, if a provider is set.
    async fn engine(&self) -> Result<Option<ReplicationEngine>> {
        let settings = self.settings.load().context("Failed to read settings")?;
        let engine = ReplicationEngine::from_settings(&settings.replication);
        let registry = create_default_registry();

        let configured = engine
            .configure_from_settings(&settings.replication, &registry)
            .await
            .context("Invalid replication settings")?;
        Ok(configured.then_some(engine))
    }

    /// Save the session and replicate it when sync-on-save is enabled.
    async fn commit(&self, session: VaultSession) -> Result<()> {
        let session = Mutex::new(session);
        let saved = session
            .lock()
            .await
            .save(&self.cancel)
            .await
            .context("Failed to save vault")?;
        let path = session.lock().await.current_file_path().map(Path::to_path_buf);

        let (true, Some(path)) = (saved, path) else {
            return Ok(());
        };
        let Some(engine) = self.engine().await? else {
            return Ok(());
        };

        let event = SessionEvent::Saved { path };
        if let Some(result) = engine.handle_event(&session, &event, &self.cancel).await? {
            report(&result);
        }
        Ok(())
    }

    async fn cmd_init(&self, path: &Path, strength: &str) -> Result<()> {
        let Some(kdf) = KdfParams::from_preset(strength) else {
            bail!("Invalid strength. Use: interactive, moderate, or sensitive");
        };

        let passphrase = prompt_new_passphrase("New passphrase: ")?;
        let mut session: VaultSession = VaultSession::new(self.settings.clone());
        session
            .create(path, passphrase.as_bytes(), &kdf, &self.cancel)
            .await
            .context("Failed to create vault")?;

        println!("Vault created: {}", path.display());
        Ok(())
    }

    async fn cmd_list(&self, path: &Path, group: Option<&str>) -> Result<()> {
        let session = self.open(path, true).await?;
        let filter = group.map(GroupPath::parse);

        let groups = session.list_groups()?;
        if filter.is_none() && !groups.is_empty() {
            println!("Groups:");
            for group in &groups {
                println!("  {}", group);
            }
        }

        let entries: Vec<_> = session
            .entries()?
            .iter()
            .enumerate()
            .filter(|(_, entry)| filter.as_ref().map_or(true, |f| entry.is_in(f)))
            .collect();

        if entries.is_empty() {
            println!("No entries.");
            return Ok(());
        }

        println!("Entries:");
        for (index, entry) in entries {
            println!(
                "  [{:>3}] {:<20} {:<24} {}",
                index,
                group_label(&entry.group),
                entry.title,
                entry.username
            );
        }
        Ok(())
    }

    async fn cmd_add(&self, path: &Path, mut request: EntryRequest, generate: bool) -> Result<()> {
        let mut session = self.open(path, false).await?;

        request.password = if generate {
            session
                .generate_password(request.policy_name.as_deref())
                .context("Failed to generate password")?
        } else {
            let password = prompt_passphrase("Entry password: ")?;
            password.to_string()
        };

        let title = request.title.clone();
        let index = session.create_entry(request).context("Failed to add entry")?;
        self.commit(session).await?;

        info!(index, "Entry added");
        println!("Added '{}' at index {}", title, index);
        Ok(())
    }

    async fn cmd_remove(&self, path: &Path, index: usize) -> Result<()> {
        let mut session = self.open(path, false).await?;
        let entry = session.delete_entry(index).context("Failed to remove entry")?;
        self.commit(session).await?;

        println!("Removed '{}'", entry.title);
        Ok(())
    }

    async fn cmd_mkgroup(&self, path: &Path, group: &str) -> Result<()> {
        let mut session = self.open(path, false).await?;
        let created = session.create_group(group).context("Failed to create group")?;
        self.commit(session).await?;

        println!("Created group {}", created);
        Ok(())
    }

    async fn cmd_rename_group(&self, path: &Path, old: &str, new: &str) -> Result<()> {
        let mut session = self.open(path, false).await?;
        let moved = session
            .rename_group(old, new)
            .context("Failed to rename group")?;
        self.commit(session).await?;

        println!("Renamed {} to {} ({} entries moved)", old, new, moved);
        Ok(())
    }

    async fn cmd_rmgroup(&self, path: &Path, group: &str) -> Result<()> {
        let mut session = self.open(path, false).await?;
        session
            .delete_empty_group(group)
            .context("Failed to delete group")?;
        self.commit(session).await?;

        println!("Deleted group {}", group);
        Ok(())
    }

    async fn cmd_move(&self, path: &Path, index: usize, group: &str) -> Result<()> {
        let mut session = self.open(path, false).await?;
        session
            .move_entry(index, group)
            .context("Failed to move entry")?;
        self.commit(session).await?;

        println!("Moved entry {} to {}", index, group_label(&GroupPath::normalize(group)));
        Ok(())
    }

    async fn cmd_policy_set(&self, args: &PolicyArgs) -> Result<()> {
        let mut session = self.open(&args.vault, false).await?;
        session
            .save_password_policy(args.to_policy(), args.rename_from.as_deref())
            .context("Failed to save policy")?;
        self.commit(session).await?;

        println!("Saved policy '{}'", args.name.trim());
        Ok(())
    }

    async fn cmd_policy_default(&self, path: &Path, name: Option<&str>) -> Result<()> {
        let mut session = self.open(path, false).await?;
        session
            .set_default_password_policy(name)
            .context("Failed to set default policy")?;
        self.commit(session).await?;

        match name {
            Some(name) => println!("Default policy is now '{}'", name),
            None => println!("Default policy cleared"),
        }
        Ok(())
    }

    async fn cmd_generate(&self, path: &Path, policy: Option<&str>) -> Result<()> {
        let session = self.open(path, true).await?;
        let password = Zeroizing::new(
            session
                .generate_password(policy)
                .context("Failed to generate password")?,
        );

        println!("{}", password.as_str());
        Ok(())
    }

    async fn cmd_change_passphrase(&self, path: &Path) -> Result<()> {
        let mut session = self.open(path, false).await?;
        let current = prompt_passphrase("Current passphrase: ")?;
        let new = prompt_new_passphrase("New passphrase: ")?;

        session
            .change_passphrase(current.as_bytes(), new.as_bytes(), &self.cancel)
            .await
            .context("Failed to change passphrase")?;

        println!("Passphrase changed.");
        Ok(())
    }

    async fn cmd_sync(&self, path: &Path, force: bool) -> Result<()> {
        let Some(engine) = self.engine().await? else {
            bail!("No replication provider configured");
        };
        let session = Mutex::new(self.open(path, false).await?);

        let trigger = if force {
            SyncTrigger::ConflictResolution
        } else {
            SyncTrigger::Manual
        };
        let result = engine
            .trigger_sync(&session, trigger, &self.cancel)
            .await
            .context("Sync cancelled")?;
        report(&result);

        let state = engine.state().await;
        if let Some(last) = state.last_synced {
            println!("Last synced: {}", last.format("%Y-%m-%d %H:%M:%S UTC"));
        }
        if !result.is_success {
            bail!("Replication failed");
        }
        Ok(())
    }
}

async fn cmd_backups(path: &Path) -> Result<()> {
    let backups = list_backups(path).await.context("Failed to list backups")?;

    if backups.is_empty() {
        println!("No backups.");
        return Ok(());
    }
    for backup in backups {
        println!("  {:>3}  {}", backup.version, backup.path.display());
    }
    Ok(())
}
