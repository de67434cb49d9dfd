use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use vpm::commands::{self, ListFilter, MissingTarget};
use vpm::config::Overrides;
use vpm::package::ApproximationPolicy;
use vpm::report::LogReporter;

/// vpm - .var package manager
///
/// Index a repository of .var archives, resolve their dependencies and
/// activate them by linking into the game's package directory.
///
/// Examples:
///   vpm update                       # Index the repository
///   vpm install bob.scene1.3         # Link a scene and everything it needs
///   vpm missing                      # Dependencies of installed packages not on disk
#[derive(Parser, Debug)]
#[command(author, version = env!("VPM_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Repository root holding the .var archives (also via VPM_REPO)
    #[arg(long = "repo", env = "VPM_REPO", value_name = "PATH", global = true)]
    pub repo: Option<PathBuf>,

    /// Directory receiving the package links (also via VPM_ACTIVATION_ROOT)
    #[arg(
        long = "activation-root",
        env = "VPM_ACTIVATION_ROOT",
        value_name = "PATH",
        global = true
    )]
    pub activation_root: Option<PathBuf>,

    /// Catalog file (defaults to <repo>/.vpm/catalog.json; also via VPM_STATE)
    #[arg(long = "state", env = "VPM_STATE", value_name = "FILE", global = true)]
    pub state: Option<PathBuf>,

    /// How to satisfy a reference whose exact version is absent
    #[arg(long = "policy", value_enum, global = true)]
    pub policy: Option<ApproximationPolicy>,

    /// JSON table of download references for missing packages
    #[arg(long = "downloads", value_name = "FILE", global = true)]
    pub downloads: Option<PathBuf>,

    /// Do not ask for confirmation
    #[arg(long = "yes", short = 'y', global = true)]
    pub yes: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Index the repository and pick up activation changes
    Update,

    /// Re-read which packages are linked
    Refresh,

    /// List packages in the catalog
    List(ListArgs),

    /// Show details about a package
    Show(ShowArgs),

    /// Link packages into the activation root
    Install(InstallArgs),

    /// Remove package links
    Uninstall(RemoveArgs),

    /// Keep package links but disable them
    Disable(NamesArgs),

    /// Move packages out of the repository
    Delete(RemoveArgs),

    /// Move the link of a package to another version of it
    Switch(SwitchArgs),

    /// Report dependencies that are not in the repository
    Missing(MissingArgs),

    /// Move redundant old versions to quarantine
    #[command(subcommand)]
    Sweep(SweepCommands),

    /// Point every link at the current location of its archive
    RebuildLinks(RebuildLinksArgs),

    /// Link a present package in place of a missing reference
    Substitute(SubstituteArgs),
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Only packages that are linked
    #[arg(long)]
    pub active: bool,

    /// Substring of the package name
    #[arg(value_name = "PATTERN")]
    pub pattern: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Package name, e.g. "creator.package.3" or "creator.package.latest"
    #[arg(value_name = "NAME")]
    pub name: String,
}

#[derive(clap::Args, Debug)]
pub struct InstallArgs {
    /// Package references
    #[arg(value_name = "NAME", required = true)]
    pub names: Vec<String>,

    /// Install only the named packages, not their dependencies
    #[arg(long = "no-deps")]
    pub no_deps: bool,
}

#[derive(clap::Args, Debug)]
pub struct RemoveArgs {
    #[arg(value_name = "NAME", required = true)]
    pub names: Vec<String>,

    /// Also take down the packages that depend on them
    #[arg(long)]
    pub cascade: bool,
}

#[derive(clap::Args, Debug)]
pub struct NamesArgs {
    #[arg(value_name = "NAME", required = true)]
    pub names: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct SwitchArgs {
    #[arg(value_name = "FROM")]
    pub from: String,

    #[arg(value_name = "TO")]
    pub to: String,
}

#[derive(clap::Args, Debug)]
pub struct MissingArgs {
    /// Look at every package in the catalog, not only linked ones
    #[arg(long, conflicts_with = "names")]
    pub all: bool,

    /// Look at these packages only
    #[arg(value_name = "NAME")]
    pub names: Vec<String>,
}

#[derive(clap::Subcommand, Debug)]
enum SweepCommands {
    /// Old versions that nothing uses
    Stale,
    /// Linked old versions; their links move to the latest version
    Superseded,
}

#[derive(clap::Args, Debug)]
pub struct RebuildLinksArgs {
    /// Rebuild links under this activation root instead of the configured one
    #[arg(long = "target", value_name = "PATH")]
    pub target: Option<PathBuf>,

    /// Leave links parked in the missing area alone
    #[arg(long = "skip-missing")]
    pub skip_missing: bool,
}

#[derive(clap::Args, Debug)]
pub struct SubstituteArgs {
    /// The missing reference, e.g. "creator.package.3"
    #[arg(value_name = "REFERENCE")]
    pub reference: String,

    /// The package standing in for it
    #[arg(value_name = "NAME")]
    pub with: String,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            repo: self.repo.clone(),
            activation_root: self.activation_root.clone(),
            state: self.state.clone(),
            policy: self.policy,
            downloads: self.downloads.clone(),
        }
    }
}

impl MissingArgs {
    fn target(self) -> MissingTarget {
        if self.all {
            MissingTarget::All
        } else if self.names.is_empty() {
            MissingTarget::Installed
        } else {
            MissingTarget::Packages(self.names)
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = vpm::runtime::RealRuntime;
    let reporter = LogReporter::new(std::io::stderr().is_terminal());

    let (settings, repo) = commands::open(&runtime, cli.overrides())?;
    let yes = cli.yes;

    match cli.command {
        Commands::Update => commands::update(&repo, &reporter)?,
        Commands::Refresh => commands::refresh(&repo)?,
        Commands::List(args) => {
            let filter = ListFilter {
                active_only: args.active,
                pattern: args.pattern,
            };
            commands::list(&repo, &filter)?
        }
        Commands::Show(args) => commands::show(&repo, &args.name)?,
        Commands::Install(args) => {
            commands::install(&repo, &args.names, !args.no_deps, &reporter)?
        }
        Commands::Uninstall(args) => {
            commands::uninstall(&runtime, &repo, &args.names, args.cascade, yes, &reporter)?
        }
        Commands::Disable(args) => commands::disable(&repo, &args.names, &reporter)?,
        Commands::Delete(args) => {
            commands::delete(&runtime, &repo, &args.names, args.cascade, yes, &reporter)?
        }
        Commands::Switch(args) => commands::switch(&repo, &args.from, &args.to)?,
        Commands::Missing(args) => commands::missing(
            &runtime,
            &repo,
            args.target(),
            settings.downloads.as_deref(),
            &reporter,
        )?,
        Commands::Sweep(SweepCommands::Stale) => commands::sweep_stale(&repo, &reporter)?,
        Commands::Sweep(SweepCommands::Superseded) => {
            commands::sweep_superseded(&repo, &reporter)?
        }
        Commands::RebuildLinks(args) => commands::rebuild_links(
            &repo,
            args.target.as_deref(),
            !args.skip_missing,
            &reporter,
        )?,
        Commands::Substitute(args) => commands::substitute(&repo, &args.reference, &args.with)?,
    }
    repo.close()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_install_parsing() {
        let cli = Cli::try_parse_from(["vpm", "install", "bob.scene1.3", "alice.hair1.2"]).unwrap();
        match cli.command {
            Commands::Install(args) => {
                assert_eq!(args.names, vec!["bob.scene1.3", "alice.hair1.2"]);
                assert!(!args.no_deps);
            }
            _ => panic!("Expected Install command"),
        }
        assert_eq!(cli.repo, None);
        assert!(!cli.yes);
    }

    #[test]
    fn test_cli_install_requires_a_name() {
        assert!(Cli::try_parse_from(["vpm", "install"]).is_err());
    }

    #[test]
    fn test_cli_global_flags_parsing() {
        let cli = Cli::try_parse_from([
            "vpm",
            "--repo",
            "/vars",
            "update",
            "--activation-root",
            "/game/AddonPackages",
            "--policy",
            "strict",
            "-y",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Update));
        let overrides = cli.overrides();
        assert_eq!(overrides.repo, Some(PathBuf::from("/vars")));
        assert_eq!(
            overrides.activation_root,
            Some(PathBuf::from("/game/AddonPackages"))
        );
        assert_eq!(overrides.policy, Some(ApproximationPolicy::Strict));
        assert!(cli.yes);
    }

    #[test]
    fn test_cli_policy_values() {
        let cli = Cli::try_parse_from(["vpm", "--policy", "closest-at-least", "update"]).unwrap();
        assert_eq!(cli.policy, Some(ApproximationPolicy::ClosestAtLeast));
        assert!(Cli::try_parse_from(["vpm", "--policy", "whatever", "update"]).is_err());
    }

    #[test]
    fn test_cli_missing_targets() {
        let parse = |args: &[&str]| match Cli::try_parse_from(args).unwrap().command {
            Commands::Missing(args) => args.target(),
            _ => panic!("Expected Missing command"),
        };
        assert_eq!(parse(&["vpm", "missing"]), MissingTarget::Installed);
        assert_eq!(parse(&["vpm", "missing", "--all"]), MissingTarget::All);
        assert_eq!(
            parse(&["vpm", "missing", "a.b.1"]),
            MissingTarget::Packages(vec!["a.b.1".to_string()])
        );
        assert!(Cli::try_parse_from(["vpm", "missing", "--all", "a.b.1"]).is_err());
    }

    #[test]
    fn test_cli_sweep_parsing() {
        let cli = Cli::try_parse_from(["vpm", "sweep", "superseded"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Sweep(SweepCommands::Superseded)
        ));
        assert!(Cli::try_parse_from(["vpm", "sweep"]).is_err());
    }

    #[test]
    fn test_cli_uninstall_cascade_parsing() {
        let cli = Cli::try_parse_from(["vpm", "uninstall", "--cascade", "a.b.1"]).unwrap();
        match cli.command {
            Commands::Uninstall(args) => {
                assert!(args.cascade);
                assert_eq!(args.names, vec!["a.b.1"]);
            }
            _ => panic!("Expected Uninstall command"),
        }
    }

    #[test]
    fn test_cli_rebuild_links_parsing() {
        let cli = Cli::try_parse_from(["vpm", "rebuild-links"]).unwrap();
        match cli.command {
            Commands::RebuildLinks(args) => {
                assert!(!args.skip_missing);
                assert_eq!(args.target, None);
            }
            _ => panic!("Expected RebuildLinks command"),
        }
        let cli =
            Cli::try_parse_from(["vpm", "rebuild-links", "--skip-missing", "--target", "/other"])
                .unwrap();
        match cli.command {
            Commands::RebuildLinks(args) => {
                assert!(args.skip_missing);
                assert_eq!(args.target, Some(PathBuf::from("/other")));
            }
            _ => panic!("Expected RebuildLinks command"),
        }
    }

    #[test]
    fn test_cli_substitute_parsing() {
        let cli = Cli::try_parse_from(["vpm", "substitute", "a.b.3", "a.b.latest"]).unwrap();
        match cli.command {
            Commands::Substitute(args) => {
                assert_eq!(args.reference, "a.b.3");
                assert_eq!(args.with, "a.b.latest");
            }
            _ => panic!("Expected Substitute command"),
        }
        assert!(Cli::try_parse_from(["vpm", "substitute", "a.b.3"]).is_err());
    }

    #[test]
    fn test_cli_no_subcommand_fails() {
        assert!(Cli::try_parse_from(["vpm", "bob.scene1.3"]).is_err());
    }
}
