//! FakeYou voice-clone TTS.
//!
//! Flow: log in for a session cookie, list models once, submit an inference
//! job, poll it until the audio path is ready, then download the audio from
//! the public bucket.

use std::time::Duration;

use chorus_core::{config::FakeYouConfig, error::ChorusError, message::Media};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_secs(2);
const MAX_POLLS: u32 = 90;

/// A voice model offered by FakeYou.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FakeYouModel {
    pub model_token: String,
    pub title: String,
    #[serde(default)]
    pub creator_username: String,
    #[serde(default)]
    pub ietf_primary_language_subtag: String,
    #[serde(default)]
    pub user_ratings: Option<UserRatings>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserRatings {
    #[serde(default)]
    pub positive_count: u64,
    #[serde(default)]
    pub total_count: u64,
}

impl FakeYouModel {
    /// Star rating out of 5, rounded to one decimal.
    pub fn rating(&self) -> f64 {
        match &self.user_ratings {
            Some(r) if r.total_count > 0 => {
                let score = r.positive_count as f64 / r.total_count as f64 * 5.0;
                (score * 10.0).round() / 10.0
            }
            _ => 0.0,
        }
    }
}

#[derive(Deserialize)]
struct ModelListResponse {
    models: Vec<FakeYouModel>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username_or_email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct InferenceRequest<'a> {
    tts_model_token: &'a str,
    uuid_idempotency_token: String,
    inference_text: &'a str,
}

#[derive(Deserialize)]
struct InferenceResponse {
    #[serde(default)]
    success: bool,
    inference_job_token: Option<String>,
}

#[derive(Deserialize)]
struct JobResponse {
    state: JobState,
}

#[derive(Deserialize)]
struct JobState {
    status: String,
    maybe_public_bucket_wav_audio_path: Option<String>,
}

/// Keep models from trusted creators or "latin" voices that are well rated
/// and speak the configured language.
pub(crate) fn filter_models(models: Vec<FakeYouModel>, config: &FakeYouConfig) -> Vec<FakeYouModel> {
    let mut kept: Vec<FakeYouModel> = models
        .into_iter()
        .filter(|m| {
            (config.creators.iter().any(|c| c == &m.creator_username)
                || m.title.to_lowercase().contains("latin"))
                && m.rating() >= config.min_rating
                && m.ietf_primary_language_subtag == config.language
        })
        .collect();
    kept.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()));
    kept
}

/// Find a model by exact token, exact title, or title substring.
pub(crate) fn find_in<'a>(models: &'a [FakeYouModel], query: &str) -> Option<&'a FakeYouModel> {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return None;
    }
    models
        .iter()
        .find(|m| m.model_token.to_lowercase() == q)
        .or_else(|| models.iter().find(|m| m.title.to_lowercase() == q))
        .or_else(|| models.iter().find(|m| m.title.to_lowercase().contains(&q)))
}

/// FakeYou API client with a lazily established session.
pub struct FakeYouClient {
    client: reqwest::Client,
    config: FakeYouConfig,
    session: Mutex<Option<String>>,
    models: RwLock<Vec<FakeYouModel>>,
}

impl FakeYouClient {
    pub fn from_config(config: &FakeYouConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config: config.clone(),
            session: Mutex::new(None),
            models: RwLock::new(Vec::new()),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.config.email.is_empty() && !self.config.password.is_empty()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Session cookie, logging in on first use.
    async fn session_cookie(&self) -> Result<String, ChorusError> {
        let mut session = self.session.lock().await;
        if let Some(cookie) = session.as_ref() {
            return Ok(cookie.clone());
        }

        let resp = self
            .client
            .post(self.url("/login"))
            .json(&LoginRequest {
                username_or_email: &self.config.email,
                password: &self.config.password,
            })
            .send()
            .await
            .map_err(|e| ChorusError::Media(format!("fakeyou login failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(ChorusError::Media(format!(
                "fakeyou login returned {}",
                resp.status()
            )));
        }

        let cookie = resp
            .headers()
            .get_all(reqwest::header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .find(|v| v.starts_with("session="))
            .map(str::to_string)
            .ok_or_else(|| ChorusError::Media("fakeyou login: no session cookie".to_string()))?;

        info!("fakeyou: logged in");
        *session = Some(cookie.clone());
        Ok(cookie)
    }

    /// Download and filter the public model list.
    pub async fn load_models(&self) -> Result<Vec<FakeYouModel>, ChorusError> {
        let resp = self
            .client
            .get(self.url("/tts/list"))
            .send()
            .await
            .map_err(|e| ChorusError::Media(format!("fakeyou model list failed: {e}")))?;
        let list: ModelListResponse = resp
            .json()
            .await
            .map_err(|e| ChorusError::Media(format!("fakeyou model list parse failed: {e}")))?;

        let total = list.models.len();
        let kept = filter_models(list.models, &self.config);
        info!("fakeyou: {} of {total} models kept", kept.len());
        *self.models.write().await = kept.clone();
        Ok(kept)
    }

    /// Cached model list, loading it on first use.
    pub async fn models(&self) -> Result<Vec<FakeYouModel>, ChorusError> {
        {
            let cached = self.models.read().await;
            if !cached.is_empty() {
                return Ok(cached.clone());
            }
        }
        self.load_models().await
    }

    pub async fn find_model(&self, query: &str) -> Result<Option<FakeYouModel>, ChorusError> {
        let models = self.models().await?;
        Ok(find_in(&models, query).cloned())
    }

    /// Synthesize `text` with a model and return the finished audio.
    pub async fn synthesize(&self, model: &FakeYouModel, text: &str) -> Result<Media, ChorusError> {
        let cookie = self.session_cookie().await?;
        debug!("fakeyou: inference with {} ({})", model.title, model.model_token);

        let resp = self
            .client
            .post(self.url("/tts/inference"))
            .header(reqwest::header::COOKIE, &cookie)
            .json(&InferenceRequest {
                tts_model_token: &model.model_token,
                uuid_idempotency_token: uuid::Uuid::new_v4().to_string(),
                inference_text: text,
            })
            .send()
            .await
            .map_err(|e| ChorusError::Media(format!("fakeyou inference failed: {e}")))?;
        let inference: InferenceResponse = resp
            .json()
            .await
            .map_err(|e| ChorusError::Media(format!("fakeyou inference parse failed: {e}")))?;

        let job_token = match (inference.success, inference.inference_job_token) {
            (true, Some(token)) => token,
            _ => {
                return Err(ChorusError::Media(
                    "fakeyou rejected the inference request".to_string(),
                ))
            }
        };

        let audio_path = self.wait_for_job(&job_token, &cookie).await?;
        let audio_url = format!("{}{audio_path}", self.config.cdn_url.trim_end_matches('/'));
        let resp = self
            .client
            .get(&audio_url)
            .send()
            .await
            .map_err(|e| ChorusError::Media(format!("fakeyou audio download failed: {e}")))?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ChorusError::Media(format!("fakeyou audio body failed: {e}")))?;
        Ok(Media::new(bytes.to_vec(), "audio/wav"))
    }

    async fn wait_for_job(&self, job_token: &str, cookie: &str) -> Result<String, ChorusError> {
        for _ in 0..MAX_POLLS {
            tokio::time::sleep(POLL_INTERVAL).await;
            let resp = self
                .client
                .get(self.url(&format!("/tts/job/{job_token}")))
                .header(reqwest::header::COOKIE, cookie)
                .send()
                .await
                .map_err(|e| ChorusError::Media(format!("fakeyou job poll failed: {e}")))?;
            let job: JobResponse = match resp.json().await {
                Ok(job) => job,
                Err(e) => {
                    warn!("fakeyou: bad job response: {e}");
                    continue;
                }
            };

            match job.state.status.as_str() {
                "complete_success" => {
                    return job.state.maybe_public_bucket_wav_audio_path.ok_or_else(|| {
                        ChorusError::Media("fakeyou job finished without audio".to_string())
                    })
                }
                "complete_failure" | "dead" => {
                    return Err(ChorusError::Media(format!(
                        "fakeyou job {job_token} failed: {}",
                        job.state.status
                    )))
                }
                _ => continue,
            }
        }
        Err(ChorusError::Media(format!(
            "fakeyou job {job_token} timed out"
        )))
    }
}
