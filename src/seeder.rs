//! Sample-data seeding for local development.
//!
//! Vacates both tables and recreates a fixed cast of users plus a batch
//! of images pointing at the bundled fixture files.

use anyhow::Result;
use tracing::info;

use crate::config::Config;
use crate::db::{NewUser, Store};
use crate::entities::users::Role;

const SAMPLE_TITLES: [&str; 21] = [
    "The Quiet Harbor",
    "A Study in Amber",
    "Winter's Cartographer",
    "The Glass Orchard",
    "Songs of the Low Tide",
    "Meridian Drift",
    "The Paper Lighthouse",
    "Ashes of the Morning",
    "The Last Tram North",
    "Salt and Starlight",
    "A Field Guide to Silence",
    "The Borrowed Sky",
    "Embers at the Gate",
    "The Clockmaker's Garden",
    "Notes from the Attic",
    "The Long Afternoon",
    "Harvest of Small Hours",
    "The Unfinished Bridge",
    "Letters to the Shore",
    "The Violet Hour",
    "Stonefruit Summer",
];

pub async fn seed(store: &Store, config: &Config) -> Result<()> {
    info!("Seeding commenced");

    let removed_images = store.clear_images().await?;
    let removed_users = store.clear_users().await?;
    info!(
        "Vacated tables ({} images, {} users)",
        removed_images, removed_users
    );

    let fixtures = [
        ("admin", "1111", "John Doe", Role::Admin),
        ("fantastic", "2222", "Jane Doe", Role::User),
        ("doting", "3333", "Taylor Hebert", Role::User),
        ("amused", "4444", "Dorian Gray", Role::User),
    ];

    let mut users = Vec::with_capacity(fixtures.len());
    for (username, password, display_name, role) in fixtures {
        let user = store
            .create_user(
                NewUser {
                    username: username.to_string(),
                    display_name: display_name.to_string(),
                    avatar: None,
                    password: password.to_string(),
                    role,
                    google_id: None,
                    token: None,
                },
                &config.security,
            )
            .await?;
        users.push(user);
    }
    info!("Created {} users", users.len());

    for (i, title) in SAMPLE_TITLES.iter().enumerate() {
        let author = &users[i % users.len()];
        store
            .add_image(
                author.id,
                title,
                &format!("/uploads/fixtures/image-{}.jpg", i + 1),
            )
            .await?;
    }
    info!("Created {} images", SAMPLE_TITLES.len());

    info!("Seeding completed");
    Ok(())
}
