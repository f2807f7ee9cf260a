use std::time::Duration;

use cfgsync::prelude::*;
use cfgsync::protocol::ConfigClass;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Weapon {
    damage: u32,
    range: f32,
}

const ADMIN: ClientId = ClientId(1);
const PLAYER: ClientId = ClientId(2);

/// Every process registers the same groups: runtime-created weapons and a
/// resource-backed tileset that ships with `grass`.
fn registry() -> Result<ConfigRegistry, CfgsyncError> {
    let tiles = MemoryGroup::resource_backed(
        "Tileset",
        [("grass".to_string(), ConfigValue(br#"{"walkable":true}"#.to_vec()))],
    );
    Ok(ConfigRegistry::new()
        .with_group(TypedGroup::<Weapon>::new("Weapon", JsonCodec))?
        .with_group(tiles)?)
}

async fn dump(name: &str, link: &ClientLink) -> Result<(), CfgsyncError> {
    let lines = link
        .read(|registry| {
            registry
                .keys()
                .into_iter()
                .map(|key| {
                    let value = registry
                        .raw(&key)
                        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                        .unwrap_or_default();
                    format!("  {key} = {value}")
                })
                .collect::<Vec<_>>()
        })
        .await?;
    println!("{name} ({}):", link.client_id());
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

/// Lets forwarded requests and broadcasts settle.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let server = SyncServer::builder(AdminList::new([ADMIN]))
        .local_registry(registry()?)
        .spawn();

    let admin = ClientLink::connect(ADMIN, registry()?, server.clone()).await?;
    let player = ClientLink::connect(PLAYER, registry()?, server.clone()).await?;

    // The admin creates a weapon and overrides a resource tile.
    let sword = ConfigEntry::new(
        ConfigKey::new("Weapon", "sword"),
        ConfigValue::encode(
            &JsonCodec,
            &Weapon {
                damage: 12,
                range: 1.5,
            },
        )?,
    );
    let grass = ConfigEntry::new(
        ConfigKey::new("Tileset", "grass"),
        ConfigValue(br#"{"walkable":false}"#.to_vec()),
    );
    admin
        .edit(move |registry| {
            registry.add(&sword)?;
            registry.update(&grass)
        })
        .await??;
    settle().await;

    // The player isn't an admin: the server drops this without a reply.
    let cheat = ConfigEntry::new(
        ConfigKey::new("Weapon", "sword"),
        ConfigValue::encode(
            &JsonCodec,
            &Weapon {
                damage: 999,
                range: 50.0,
            },
        )?,
    );
    player.edit(move |registry| registry.update(&cheat)).await??;
    settle().await;

    dump("admin", &admin).await?;
    dump("player", &player).await?;

    // The player's local copy diverged; a resync restores the shared state.
    player.disconnect().await?;
    player.reconnect().await?;
    settle().await;
    dump("player after resync", &player).await?;

    let sword = player
        .read(|registry| {
            registry
                .group_as::<TypedGroup<Weapon>>(&ConfigClass::new("Weapon"))
                .and_then(|group| group.handle("sword"))
        })
        .await?;
    if let Some(handle) = sword {
        let weapon = handle.read().map_err(|_| "weapon lock poisoned")?.clone();
        println!("player sees sword: {}", serde_json::to_string(&weapon)?);
    }

    if let Some(configs) = server.local_configs().await? {
        println!("server holds {} configs", configs.len());
    }

    let snapshot = server.snapshot().await?;
    tracing::info!(
        added = snapshot.added.len(),
        updated = snapshot.updated.len(),
        removed = snapshot.removed.len(),
        "shared sets"
    );

    admin.shutdown().await?;
    player.shutdown().await?;
    server.shutdown().await?;
    Ok(())
}
