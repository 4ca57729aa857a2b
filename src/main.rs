use anyhow::Result;
use serenity::{http::Http, model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info};

use guild_jukebox::{
    audio::MusicService,
    bot::JukeboxBot,
    config::Config,
    sources::YtDlpResolver,
    ui::announcer::SerenityAnnouncer,
    voice::SongbirdGateway,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("guild_jukebox=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Guild Jukebox v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Arc::new(Config::load()?);
    info!("{}", config.summary());

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&config.ytdlp_path).await;
    }

    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    // Voz, búsqueda y anuncios
    let manager = Songbird::serenity();
    let gateway = Arc::new(SongbirdGateway::new(
        manager.clone(),
        config.default_volume,
        config.track_start_timeout(),
    ));
    let settings = config.music_settings();
    let resolver = Arc::new(YtDlpResolver::new(
        config.ytdlp_path.clone(),
        settings.max_choices,
    ));
    let announcer = Arc::new(SerenityAnnouncer::new(Arc::new(Http::new(
        &config.discord_token,
    ))));

    let (service, signals) = MusicService::new(gateway.clone(), resolver, announcer, settings);
    tokio::spawn(service.clone().run_signal_loop(signals));

    // Construir cliente
    let handler = JukeboxBot::new(config.clone(), service, gateway);
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(manager)
        .await?;

    // Manejar shutdown graceful
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Error al registrar Ctrl+C");
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        std::process::exit(0);
    });

    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

async fn health_check(ytdlp_path: &str) -> Result<()> {
    let yt_dlp = async_process::Command::new(ytdlp_path)
        .arg("--version")
        .output()
        .await?;

    if yt_dlp.status.success() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("yt-dlp no disponible en '{}'", ytdlp_path);
    }
}
