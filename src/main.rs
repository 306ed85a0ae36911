use azure_zone_migrate::output::{print_batch_report, print_error, print_outcome};
use azure_zone_migrate::{
    config, migrate_load_balancer_vms, migrate_vm_and_rewire, AzCliProvider, BackupStore,
    BatchOptions, CloudProvider, InMemoryProvider, MigrationOptions, MigrationRequest,
    ResourceMigrator, ResourceRef,
};
use clap::{Parser, Subcommand};
use std::error::Error;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Move Azure VMs into availability zones and load balancers to Standard SKU"
)]
struct Args {
    /// Subscription to work in; defaults to the az CLI's current one.
    #[arg(long, env = "AZURE_SUBSCRIPTION_ID")]
    subscription: Option<String>,

    /// Where `<name>-configbackup.json` files are written.
    #[arg(long, env = "MIGRATE_BACKUP_DIR", default_value = config::DEFAULT_BACKUP_DIR)]
    backup_dir: String,

    /// Rehearse against a JSON fixture instead of Azure.
    #[arg(long, env = "MIGRATE_FIXTURE")]
    fixture: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Move one VM into an availability zone.
    Vm {
        #[arg(long)]
        resource_group: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        zone: u8,
        #[arg(long)]
        cleanup_snapshots: bool,
    },
    /// Move every VM behind a Standard load balancer, zones assigned round-robin.
    LbVms {
        #[arg(long)]
        resource_group: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        continue_on_error: bool,
        #[arg(long)]
        cleanup_snapshots: bool,
    },
    /// Replace a Basic load balancer and its public IPs with Standard ones.
    LbStandard {
        #[arg(long)]
        resource_group: String,
        #[arg(long)]
        name: String,
    },
}

fn provider(args: &Args) -> Result<Box<dyn CloudProvider>, Box<dyn Error>> {
    match &args.fixture {
        Some(path) => {
            log::warn!("Rehearsal against fixture {path}, Azure is not touched");
            Ok(Box::new(InMemoryProvider::from_fixture_file(path)?))
        }
        None => Ok(Box::new(AzCliProvider::new(args.subscription.as_deref())?)),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Do as little as possible in main.rs as it can't contain any tests
    log4rs::init_file("log4rs.yml", Default::default())?;
    dotenv::dotenv().ok();
    let args = Args::parse();
    log::info!("#Start main() {:?}", args.command);

    let provider = provider(&args)?;
    let backups = BackupStore::new(&args.backup_dir);
    log::info!("Config backups go to {}", backups.dir().display());

    match &args.command {
        Command::Vm {
            resource_group,
            name,
            zone,
            cleanup_snapshots,
        } => {
            let request = MigrationRequest::vm_to_zone(resource_group, name, *zone);
            let options = MigrationOptions {
                cleanup_snapshots: *cleanup_snapshots,
            };
            match migrate_vm_and_rewire(provider.as_ref(), backups, &request, options) {
                Ok(outcome) => print_outcome(&outcome),
                Err(e) => {
                    print_error(&e);
                    return Err(e.into());
                }
            }
        }
        Command::LbVms {
            resource_group,
            name,
            continue_on_error,
            cleanup_snapshots,
        } => {
            let options = BatchOptions {
                continue_on_error: *continue_on_error,
                cleanup_snapshots: *cleanup_snapshots,
            };
            let lb = ResourceRef::new(resource_group, name);
            match migrate_load_balancer_vms(provider.as_ref(), backups, &lb, &options) {
                Ok(report) => {
                    print_batch_report(&report);
                    if !report.is_clean() {
                        let message =
                            format!("batch migration of VMs behind {lb} did not complete");
                        return Err(message.into());
                    }
                }
                Err(e) => {
                    print_error(&e);
                    return Err(e.into());
                }
            }
        }
        Command::LbStandard {
            resource_group,
            name,
        } => {
            let migrator =
                ResourceMigrator::new(provider.as_ref(), backups, MigrationOptions::default());
            let request = MigrationRequest::load_balancer_to_standard(resource_group, name);
            match migrator.migrate(&request) {
                Ok(outcome) => print_outcome(&outcome),
                Err(e) => {
                    print_error(&e);
                    return Err(e.into());
                }
            }
        }
    }

    log::info!("#End main()");
    Ok(())
}
