use std::sync::Arc;

use anyhow::Context;

use crate::{
    configuration::Configuration,
    dal::llm_call_db::{LlmCallLog, LLM_CALLS_FILE},
    services::{build_backend, ApplySettings, Bot, BotError, ChatModel, Droid, HhSite},
};

/// Wires every component together and runs login, search and the apply loop.
/// Returns the number of successful applications.
pub async fn run(configuration: Configuration) -> anyhow::Result<u32> {
    let Configuration {
        settings,
        secrets,
        search,
        resume,
        data_folder,
    } = configuration;
    let output_dir = data_folder.output_dir();

    let backend = build_backend(&settings.llm, &secrets.llm_api_key)
        .context("Failed to set up the LLM backend")?;
    let call_log = LlmCallLog::load(output_dir.join(LLM_CALLS_FILE))?;
    let chat = Arc::new(ChatModel::new(backend, settings.llm.clone()).with_call_log(call_log));

    let droid = Droid::new(&settings.browser)
        .await
        .context("Failed to start the browser, is chromedriver running?")?;
    let site = Arc::new(HhSite::new(droid, settings.browser.clone()));

    let mut bot = Bot::new(site.clone());
    bot.set_parameters(
        search,
        ApplySettings::new(&settings.bot, &data_folder),
        &output_dir,
    )?;
    bot.set_resume(Arc::new(resume));
    bot.set_answerer(
        chat,
        settings.bot.job_is_interesting_thresh,
        settings.bot.fixed_cover_letter.clone(),
        settings.bot.resume_style.as_deref(),
    )?;

    let applied = drive(&mut bot).await;
    drop(bot);

    match Arc::try_unwrap(site) {
        Ok(site) => {
            if let Err(e) = site.into_droid().quit().await {
                log::error!("Failed to close the browser: {}", e);
            }
        }
        Err(_) => log::warn!("Browser session still in use, leaving it open"),
    }

    Ok(applied?)
}

async fn drive(bot: &mut Bot<HhSite>) -> Result<u32, BotError> {
    bot.start_login().await?;
    bot.set_search_parameters().await?;
    bot.start_applying().await
}
