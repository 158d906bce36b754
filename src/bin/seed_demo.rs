// Seeds a small demo graph: profiles, follows, restaurants, reviews,
// comments, likes, and bookmarks. Development utility, safe to re-run
// against a scratch database.

use std::sync::Arc;

use rand::Rng;
use serde_json::json;
use uuid::Uuid;

use tastemap::{
    app_state::AppState,
    config::Config,
    core::Viewer,
    error::{AppError, AppResult},
    gateway::{DataGateway, MemoryGateway, PostgresGateway, Table},
    models::{decode, NewProfile, NewReview, NewThread},
};

#[tokio::main]
async fn main() -> AppResult<()> {
    let config = Config::from_env()?;

    // --dry-run exercises the whole seed path against the in-memory gateway
    // without touching a database
    let dry_run = std::env::args().any(|arg| arg == "--dry-run");
    let gateway: Arc<dyn DataGateway> = if dry_run {
        println!("Dry run: seeding the in-memory gateway only");
        Arc::new(MemoryGateway::new())
    } else {
        println!("Seeding demo data into {}", config.database.url);
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .connect(&config.database.url)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to connect to database: {}", e))
            })?;
        let postgres = PostgresGateway::new(pool);
        postgres.initialize().await?;
        Arc::new(postgres)
    };
    let state = AppState::with_gateway(gateway.clone(), config);

    // Profiles: one of them private so the request flow has something to do
    let people = vec![
        ("ana_eats", "Ana Flores", true),
        ("marco.reviews", "Marco Beltran", true),
        ("quiet_hana", "Hana Sato", false),
        ("big_tex_bites", "Dale Whitfield", true),
        ("noodle_scout", "Priya Raman", true),
    ];

    let mut user_ids = Vec::new();
    println!("\nCreating {} profiles...", people.len());
    for (username, display_name, is_public) in &people {
        let user_id = Uuid::new_v4();
        let viewer = Viewer::authenticated(user_id);
        let profile = state
            .profiles
            .create_profile(
                &viewer,
                NewProfile {
                    username: username.to_string(),
                    display_name: Some(display_name.to_string()),
                    is_public: *is_public,
                },
            )
            .await?;
        println!("  created @{} ({})", profile.username, profile.id);
        user_ids.push(user_id);
    }

    // Follow graph by index into user_ids; 2 is the private account
    println!("\nCreating follows...");
    let follows = vec![
        (0, 1),
        (0, 2),
        (0, 3),
        (1, 0),
        (1, 2),
        (3, 0),
        (3, 4),
        (4, 0),
        (4, 1),
    ];
    for (from_idx, to_idx) in follows {
        let viewer = Viewer::authenticated(user_ids[from_idx]);
        let status = state
            .relationships
            .follow_user(&viewer, user_ids[to_idx])
            .await?;
        println!(
            "  @{} -> @{}: {:?}",
            people[from_idx].0, people[to_idx].0, status
        );
    }

    // Hana accepts Ana's request but leaves Marco's pending
    let hana = Viewer::authenticated(user_ids[2]);
    state
        .relationships
        .accept_follow_request(&hana, user_ids[0])
        .await?;
    println!("  @quiet_hana accepted @ana_eats");

    // Restaurants land straight in the collection; the app never creates
    // them. The string coordinates and odd price tag below are the kind of
    // rows the curation pipeline actually produces.
    println!("\nInserting restaurants...");
    let restaurants = vec![
        json!({
            "name": "La Milpa",
            "cuisine": "Mexican",
            "latitude": 29.4241,
            "longitude": -98.4936,
            "price": "$",
            "rating": 4.6,
            "address": "418 Produce Row"
        }),
        json!({
            "name": "Golden Bowl Pho",
            "cuisine": "Vietnamese",
            "latitude": "29.5123",
            "longitude": "-98.5877",
            "price": "$",
            "rating": 4.4,
            "address": "7310 Wurzbach Rd"
        }),
        json!({
            "name": "Sakura Omakase",
            "cuisine": "Japanese",
            "latitude": 29.6089,
            "longitude": -98.5021,
            "price": "$$$premium",
            "rating": 4.9,
            "address": "1100 Broadway"
        }),
        json!({
            "name": "Brace's Smokehouse",
            "cuisine": "Barbecue",
            "latitude": 29.3772,
            "longitude": -98.4321,
            "price": "$$",
            "rating": 4.2,
            "address": "2202 S Flores St"
        }),
        json!({
            "name": "Taverna Eleni",
            "cuisine": "Greek",
            "latitude": 29.4419,
            "longitude": -98.4824,
            "price": "$$",
            "rating": 4.1,
            "address": "903 E Houston St"
        }),
        json!({
            "name": "Counter Nine",
            "cuisine": "New American",
            "latitude": 29.4587,
            "longitude": -98.4702,
            "rating": 3.9,
            "address": "9 N Alamo St"
        }),
    ];

    let mut restaurant_ids = Vec::new();
    for mut value in restaurants {
        let id = Uuid::new_v4();
        value["id"] = json!(id.to_string());
        let name = value["name"].as_str().unwrap_or("?").to_string();
        gateway
            .insert(Table::Restaurants, decode::row_from_value(value))
            .await?;
        println!("  inserted {} ({})", name, id);
        restaurant_ids.push(id);
    }

    // Reviews: each person covers a few spots, ratings jittered
    println!("\nWriting reviews...");
    let mut rng = rand::rng();
    let bodies = [
        "Carnitas were falling apart in the best way. Corn tortillas clearly made in-house.",
        "Broth simmered until it tastes like someone's grandmother supervised. Brisket cut thin and clean.",
        "Quiet counter, twelve seats, chef talks you through every course. Worth the wait for a reservation.",
        "Ribs had real bark on them. Sides are an afterthought but nobody comes here for the coleslaw.",
        "Lamb was tender and the lemon potatoes disappeared first. Loud room on weekends.",
        "Solid, not exciting. Good for a weeknight when nobody can agree on anything.",
    ];
    let mut review_ids = Vec::new();
    for (user_idx, user_id) in user_ids.iter().enumerate() {
        let viewer = Viewer::authenticated(*user_id);
        for offset in 0..3 {
            let restaurant_idx = (user_idx + offset * 2) % restaurant_ids.len();
            let rating = rng.random_range(6..=10) as f64 / 2.0;
            let post = state
                .posts
                .create_review(
                    &viewer,
                    NewReview {
                        restaurant_id: restaurant_ids[restaurant_idx],
                        rating,
                        body: Some(bodies[(user_idx + offset) % bodies.len()].to_string()),
                        image_urls: Vec::new(),
                    },
                )
                .await?;
            review_ids.push(post.id);
        }
    }
    println!("  wrote {} reviews", review_ids.len());

    // One discussion thread hanging off the first review
    let ana = Viewer::authenticated(user_ids[0]);
    let thread = state
        .posts
        .create_thread(
            &ana,
            NewThread {
                title: Some("Best tortillas in town?".to_string()),
                body: "La Milpa sets the bar. Where else should I be looking?".to_string(),
                attached_review_id: Some(review_ids[0]),
            },
        )
        .await?;
    println!("\nStarted thread {}", thread.id);

    // Comments and likes on the thread
    let marco = Viewer::authenticated(user_ids[1]);
    let comment = state
        .engagement
        .add_comment(
            &marco,
            thread.id,
            None,
            "The stand inside the Pearl market on Saturdays. No sign, follow the line.".to_string(),
        )
        .await?;
    state
        .engagement
        .add_comment(
            &ana,
            thread.id,
            Some(comment.id),
            "Going this weekend, thanks!".to_string(),
        )
        .await?;
    for user_id in &user_ids[1..4] {
        let viewer = Viewer::authenticated(*user_id);
        state.engagement.like_post(&viewer, thread.id).await?;
    }
    println!("Added comments and likes");

    // A few bookmarks
    println!("\nSaving bookmarks...");
    for (user_idx, restaurant_idx) in [(0, 1), (0, 2), (1, 0), (4, 3)] {
        let viewer = Viewer::authenticated(user_ids[user_idx]);
        state
            .saved
            .save(&viewer, restaurant_ids[restaurant_idx])
            .await?;
    }

    println!("\nDone.");
    println!(
        "  {} profiles, {} restaurants, {} reviews",
        user_ids.len(),
        restaurant_ids.len(),
        review_ids.len()
    );
    Ok(())
}
