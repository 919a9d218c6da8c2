//! Cadenza - A voice-controlled music streaming client core
//! Playback state machine driven by a rule-based voice intent pipeline

mod api;
mod features;
mod player;
mod voice;

use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncBufReadExt;
use tracing::{debug, info, warn};

use api::{CatalogClient, InMemoryUserStore, Profile, StoredSong, Track, UserDataStore};
use features::{RepeatMode, Settings, SpeechBackend};
use player::{LocalTransport, PlaybackState, RemoteTransport, Transport};
use voice::{
    IntentExecutor, MockSpeech, SessionConfig, SessionEvent, SessionEventReceiver, SessionPhase,
    SpeechService, VoiceSessionController, WhisperSpeech,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing for logging
    tracing_subscriber::fmt::init();

    let mut settings = Settings::load();

    let (client_id, client_secret) = settings.catalog.credentials().unwrap_or_else(|| {
        warn!("no catalog credentials configured, catalog requests will fail");
        (String::new(), String::new())
    });
    let catalog = Arc::new(CatalogClient::with_base_urls(
        client_id,
        client_secret,
        settings.catalog.api_base.clone(),
        settings.catalog.token_url.clone(),
    ));

    let transport: Arc<dyn Transport> = if settings.catalog.device_id.is_empty() {
        Arc::new(LocalTransport::new())
    } else {
        info!("driving remote device {}", settings.catalog.device_id);
        Arc::new(RemoteTransport::new(
            (*catalog).clone(),
            settings.catalog.device_id.clone(),
        ))
    };

    let speech: Arc<dyn SpeechService> = match settings.voice.speech_backend {
        SpeechBackend::Mock => Arc::new(MockSpeech::new()),
        SpeechBackend::Whisper => Arc::new(WhisperSpeech::new(
            &settings.voice.speech_endpoint,
            &settings.voice.speech_api_key,
        )),
    };
    info!("speech backend: {}", settings.voice.speech_backend);

    let player = PlaybackState::new(transport);
    player.set_volume(settings.volume as i32).await;
    if settings.shuffle {
        player.set_shuffle(true).await;
    }
    if settings.repeat != RepeatMode::Off {
        player.set_repeat(settings.repeat).await;
    }

    let store = Arc::new(InMemoryUserStore::new());
    store
        .upsert_profile(Profile {
            id: settings.account.user_id.clone(),
            username: settings.account.username.clone(),
            avatar_url: String::new(),
        })
        .await?;

    // Seed the store from listening history so store-backed intents like
    // "add ... to ..." have songs to find
    match catalog.recently_played().await {
        Ok(tracks) => {
            info!("seeding library with {} recently played tracks", tracks.len());
            for track in &tracks {
                store.add_song(stored_song(track));
            }
        }
        Err(e) => debug!("no listening history available: {:#}", e),
    }

    let executor = Arc::new(IntentExecutor::new(
        player.clone(),
        catalog.clone(),
        store.clone(),
        settings.account.user_id.clone(),
    ));
    let controller = VoiceSessionController::new(
        speech,
        executor,
        SessionConfig::from_settings(&settings.voice),
    );

    // Position clock: advance while playing, hand track ends to the queue
    {
        let player = player.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(1000));
            loop {
                interval.tick().await;
                if player.tick_position(1000) {
                    player.track_ended().await;
                }
            }
        });
    }

    // Mirror state changes into the log
    {
        let mut changes = player.subscribe();
        tokio::spawn(async move {
            while let Some(change) = changes.recv().await {
                debug!("state change: {:?}", change);
            }
        });
    }

    run_console(controller, player.clone(), catalog).await?;

    // Persist playback preferences for the next session
    let snapshot = player.snapshot();
    settings.volume = snapshot.volume;
    settings.shuffle = snapshot.shuffle;
    settings.repeat = snapshot.repeat;
    if let Err(e) = settings.save() {
        warn!("could not save settings: {}", e);
    }
    Ok(())
}

fn stored_song(track: &Track) -> StoredSong {
    StoredSong {
        id: track.id.clone(),
        title: track.title.clone(),
        artist: track.artist_line(),
        album: track.album.clone(),
        duration_ms: track.duration_ms,
        cover_url: track.artwork_url.clone(),
        audio_url: track.preview_url.clone().unwrap_or_default(),
    }
}

// ============================================================================
// Console
// ============================================================================

async fn run_console(
    controller: VoiceSessionController,
    player: PlaybackState,
    catalog: Arc<CatalogClient>,
) -> anyhow::Result<()> {
    let mut events = controller.subscribe();
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    println!("Cadenza voice console");
    println!("Say things like \"play daft punk\", \"pause\", \"skip\", \"like this song\".");
    println!("Commands: listen, status, queue, push <name>, drop <id>, clear, vol <n>, seek <s>,");
    println!("          browse, recent, playlists, open <id>, album <id>, similar, quit");

    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (command, arg) = line
            .split_once(' ')
            .map_or((line, ""), |(c, rest)| (c, rest.trim()));
        match (command, arg) {
            ("quit" | "exit", _) => break,
            ("listen", _) => listen(&controller, &mut events).await,
            ("status", _) => print_status(&player),
            ("queue", _) => print_queue(&player),
            ("push", name) if !name.is_empty() => push_track(&catalog, &player, name).await,
            ("drop", id) if !id.is_empty() => player.remove_from_queue(id),
            ("clear", _) => {
                player.stop().await;
                player.set_queue(Vec::new());
                println!("  stopped and cleared the queue");
            }
            ("vol", n) if !n.is_empty() => match n.parse::<i32>() {
                Ok(v) => {
                    player.set_volume(v).await;
                    println!("  volume {}%", player.volume());
                }
                Err(_) => println!("  vol takes a number, e.g. vol 60"),
            },
            ("seek", s) if !s.is_empty() => match s.parse::<i64>() {
                Ok(secs) => {
                    player.seek(secs * 1000).await;
                    println!(
                        "  at {} / {}",
                        format_ms(player.position_ms()),
                        format_ms(player.duration_ms())
                    );
                }
                Err(_) => println!("  seek takes seconds, e.g. seek 90"),
            },
            ("browse", _) => browse(&catalog).await,
            ("recent", _) => print_recent(&catalog).await,
            ("playlists", _) => print_playlists(&catalog).await,
            ("open", id) if !id.is_empty() => open_playlist(&catalog, &player, id).await,
            ("album", id) if !id.is_empty() => open_album(&catalog, &player, id).await,
            ("similar", _) => queue_similar(&catalog, &player).await,
            _ => speak(&controller, &mut events, line).await,
        }
    }
    Ok(())
}

/// Run one push-to-talk session against the configured speech backend.
/// The mock backend fabricates the clip and replays its next canned
/// transcript, so this shows the whole pipeline without a microphone.
async fn listen(controller: &VoiceSessionController, events: &mut SessionEventReceiver) {
    if !controller.start_session().await {
        // A denied microphone presents its own feedback; anything else
        // means a session is still running
        if controller.feedback().is_none() {
            println!("  (still busy with the last command)");
            return;
        }
    } else {
        controller.finish_capture().await;
    }

    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::PhaseChanged(SessionPhase::Idle) => {}
            SessionEvent::PhaseChanged(phase) => println!("  [{}]", phase.display_name()),
            SessionEvent::FeedbackReady(result) => println!("  {}", result.message),
            SessionEvent::FeedbackCleared => break,
        }
    }
}

/// Feed a typed line through the voice pipeline as if it were transcribed
async fn speak(
    controller: &VoiceSessionController,
    events: &mut SessionEventReceiver,
    line: &str,
) {
    let Some(result) = controller.run_utterance(line).await else {
        println!("  (still busy with the last command)");
        return;
    };
    println!("  {}", result.message);

    // Hold the prompt until the feedback window closes, so the next line
    // starts from an idle controller
    while let Some(event) = events.recv().await {
        if matches!(event, SessionEvent::FeedbackCleared) {
            break;
        }
    }
}

fn print_status(player: &PlaybackState) {
    let s = player.snapshot();
    match &s.current {
        Some(track) => println!(
            "  {} {} by {} [{} / {}]{}",
            if s.playing { "playing:" } else { "paused:" },
            track.title,
            track.artist_line(),
            format_ms(s.position_ms),
            format_ms(s.duration_ms),
            if s.favorite { " (liked)" } else { "" },
        ),
        None => println!("  nothing playing"),
    }
    println!(
        "  queue {} | volume {}% | shuffle {} | repeat {}",
        s.queue_len,
        s.volume,
        if s.shuffle { "on" } else { "off" },
        s.repeat.display_name(),
    );
}

fn print_queue(player: &PlaybackState) {
    let queue = player.queue();
    if queue.is_empty() {
        println!("  queue is empty");
        return;
    }
    let current_id = player.current_track().map(|t| t.id);
    for (i, track) in queue.iter().enumerate() {
        let marker = if Some(&track.id) == current_id.as_ref() {
            ">"
        } else {
            " "
        };
        println!(
            "  {} {:2}. {} by {}",
            marker,
            i + 1,
            track.title,
            track.artist_line()
        );
    }
}

async fn browse(catalog: &CatalogClient) {
    match catalog.featured_playlists().await {
        Ok(lists) => {
            println!("  featured playlists:");
            for p in lists.iter().take(8) {
                println!("    {}  {} ({} tracks)", p.id, p.name, p.track_count);
            }
        }
        Err(e) => println!("  featured playlists failed: {:#}", e),
    }
    match catalog.new_releases().await {
        Ok(albums) => {
            println!("  new releases:");
            for a in albums.iter().take(8) {
                println!("    {}  {} by {}", a.id, a.name, a.artists.join(", "));
            }
        }
        Err(e) => println!("  new releases failed: {:#}", e),
    }
}

async fn print_recent(catalog: &CatalogClient) {
    match catalog.recently_played().await {
        Ok(tracks) if tracks.is_empty() => println!("  no listening history"),
        Ok(tracks) => {
            for t in tracks.iter().take(10) {
                println!("  {} by {}", t.title, t.artist_line());
            }
        }
        Err(e) => println!("  recently played failed: {:#}", e),
    }
}

async fn print_playlists(catalog: &CatalogClient) {
    match catalog.user_playlists().await {
        Ok(lists) if lists.is_empty() => println!("  no playlists"),
        Ok(lists) => {
            for p in lists {
                println!("  {}  {} ({} tracks)", p.id, p.name, p.track_count);
            }
        }
        Err(e) => println!("  playlists failed: {:#}", e),
    }
}

async fn open_playlist(catalog: &CatalogClient, player: &PlaybackState, id: &str) {
    match catalog.playlist_detail(id).await {
        Ok(detail) if detail.tracks.is_empty() => println!("  {} is empty", detail.name),
        Ok(detail) => {
            println!("  {} ({} tracks)", detail.name, detail.tracks.len());
            let first = detail.tracks[0].clone();
            player.set_queue(detail.tracks);
            player.play_track(first).await;
        }
        Err(e) => println!("  could not open playlist: {:#}", e),
    }
}

async fn open_album(catalog: &CatalogClient, player: &PlaybackState, id: &str) {
    match catalog.album(id).await {
        Ok(album) if album.tracks.is_empty() => println!("  {} has no tracks", album.name),
        Ok(album) => {
            println!(
                "  {} by {} ({} tracks)",
                album.name,
                album.artists.join(", "),
                album.tracks.len()
            );
            let first = album.tracks[0].clone();
            player.set_queue(album.tracks);
            player.play_track(first).await;
        }
        Err(e) => println!("  could not open album: {:#}", e),
    }
}

/// Search the catalog and append the best match to the queue
async fn push_track(catalog: &CatalogClient, player: &PlaybackState, name: &str) {
    match catalog.search_tracks(name, 1).await {
        Ok(tracks) => match tracks.into_iter().next() {
            Some(track) => {
                println!("  queued {} by {}", track.title, track.artist_line());
                player.enqueue(track).await;
            }
            None => println!("  no match for \"{}\"", name),
        },
        Err(e) => println!("  search failed: {:#}", e),
    }
}

/// Replace the queue with recommendations seeded from the current track
async fn queue_similar(catalog: &CatalogClient, player: &PlaybackState) {
    let Some(track) = player.current_track() else {
        println!("  play something first");
        return;
    };
    match catalog.recommendations(std::slice::from_ref(&track.id)).await {
        Ok(tracks) if tracks.is_empty() => println!("  no similar tracks found"),
        Ok(tracks) => {
            println!("  queued {} tracks similar to {}", tracks.len(), track.title);
            let mut queue = vec![track];
            queue.extend(tracks);
            player.set_queue(queue);
        }
        Err(e) => println!("  recommendations failed: {:#}", e),
    }
}

fn format_ms(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{}:{:02}", secs / 60, secs % 60)
}
