//! provision - lot, spot, and plate registration setup
//!
//! Everything `gated` expects to find in its database is created here:
//! the capacity-bounded lot row, the mapped spots, and registered plates.

use anyhow::Result;
use clap::{Parser, Subcommand};

use gate_kernel::{
    OccupancyStore, ParkingResource, ParkingSpot, SqliteOccupancyStore, SqliteRegistry,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Database path shared with gated.
    #[arg(long, env = "GATE_DB_PATH", default_value = "gate.db")]
    db: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create (or reset) a capacity-bounded lot.
    InitLot {
        #[arg(long, default_value = "main_lot")]
        id: String,
        #[arg(long, default_value = "Central Lot")]
        name: String,
        #[arg(long, default_value_t = 100)]
        capacity: u32,
        /// Vehicles already inside.
        #[arg(long, default_value_t = 0)]
        occupancy: u32,
    },
    /// Seed the demo spot map.
    CreateSpots,
    /// Register a plate to an owner.
    Register {
        plate: String,
        #[arg(long, default_value = "unknown-owner")]
        owner: String,
    },
    /// Show a lot's counter and the first empty spot.
    Show {
        #[arg(long, default_value = "main_lot")]
        id: String,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let store = SqliteOccupancyStore::open(&args.db)?;

    match args.command {
        Command::InitLot {
            id,
            name,
            capacity,
            occupancy,
        } => {
            store.provision_resource(&ParkingResource {
                id: id.clone(),
                name,
                total_capacity: capacity,
                current_occupancy: occupancy,
            })?;
            println!("lot '{id}' ready: {occupancy}/{capacity} occupied");
        }
        Command::CreateSpots => {
            for (id, name, lat, lng, occupied) in [
                ("spot_A1", "A-1 (near entrance)", 41.08500, 29.04500, false),
                ("spot_A2", "A-2 (near entrance)", 41.08505, 29.04505, true),
                ("spot_B1", "B-1 (mid area)", 41.08520, 29.04520, false),
                ("spot_B2", "B-2 (mid area)", 41.08525, 29.04525, false),
                ("spot_C1", "C-1 (near exit)", 41.08550, 29.04550, false),
            ] {
                store.provision_spot(&ParkingSpot {
                    id: id.to_string(),
                    name: name.to_string(),
                    lat,
                    lng,
                    occupied,
                })?;
                println!("added {id} -> {name}");
            }
        }
        Command::Register { plate, owner } => {
            let registry = SqliteRegistry::open(&args.db)?;
            registry.register(&plate, &owner)?;
            println!("registered {} to {}", gate_kernel::normalize(&plate), owner);
        }
        Command::Show { id } => {
            let resource = store.resource(&id)?;
            println!(
                "{} ({}): {}/{} occupied",
                resource.name, resource.id, resource.current_occupancy, resource.total_capacity
            );
            match store.first_empty_spot()? {
                Some(spot) => println!("first empty spot: {} ({})", spot.id, spot.name),
                None => println!("no empty spots"),
            }
        }
    }
    Ok(())
}
