//! Persona table CRUD.

use super::Store;
use chorus_core::{error::ChorusError, persona::PersonaConfig};

type PersonaRow = (
    String,
    String,
    bool,
    String,
    String,
    i64,
    i64,
    i64,
    i64,
    i64,
    Option<String>,
    Option<String>,
);

fn to_u32(v: i64) -> u32 {
    u32::try_from(v.max(0)).unwrap_or(u32::MAX)
}

fn from_row(row: PersonaRow) -> PersonaConfig {
    let (
        name,
        prompt_text,
        build_prompt,
        groups,
        prefix,
        limit,
        hours_limit,
        max_images,
        max_tokens,
        character_limit,
        voice_id,
        pre_message,
    ) = row;
    PersonaConfig {
        name,
        prompt_text,
        build_prompt,
        groups,
        prefix,
        limit: to_u32(limit),
        hours_limit: to_u32(hours_limit),
        max_images: to_u32(max_images),
        max_tokens: to_u32(max_tokens),
        character_limit: to_u32(character_limit),
        voice_id: voice_id.filter(|v| !v.is_empty()),
        pre_message: pre_message.filter(|v| !v.is_empty()),
    }
}

impl Store {
    /// All personas in insertion order.
    pub async fn load_personas(&self) -> Result<Vec<PersonaConfig>, ChorusError> {
        let rows: Vec<PersonaRow> = sqlx::query_as(
            "SELECT name, prompt_text, build_prompt, groups, prefix, msg_limit, hours_limit, \
             max_images, max_tokens, character_limit, voice_id, pre_message \
             FROM personas ORDER BY rowid ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ChorusError::Memory(format!("load personas failed: {e}")))?;

        Ok(rows.into_iter().map(from_row).collect())
    }

    /// Insert or replace a persona by name.
    pub async fn upsert_persona(&self, persona: &PersonaConfig) -> Result<(), ChorusError> {
        sqlx::query(
            "INSERT INTO personas (name, prompt_text, build_prompt, groups, prefix, msg_limit, \
             hours_limit, max_images, max_tokens, character_limit, voice_id, pre_message) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(name) DO UPDATE SET \
             prompt_text = excluded.prompt_text, build_prompt = excluded.build_prompt, \
             groups = excluded.groups, prefix = excluded.prefix, msg_limit = excluded.msg_limit, \
             hours_limit = excluded.hours_limit, max_images = excluded.max_images, \
             max_tokens = excluded.max_tokens, character_limit = excluded.character_limit, \
             voice_id = excluded.voice_id, pre_message = excluded.pre_message, \
             updated_at = datetime('now')",
        )
        .bind(&persona.name)
        .bind(&persona.prompt_text)
        .bind(persona.build_prompt)
        .bind(&persona.groups)
        .bind(&persona.prefix)
        .bind(i64::from(persona.limit))
        .bind(i64::from(persona.hours_limit))
        .bind(i64::from(persona.max_images))
        .bind(i64::from(persona.max_tokens))
        .bind(i64::from(persona.character_limit))
        .bind(&persona.voice_id)
        .bind(&persona.pre_message)
        .execute(&self.pool)
        .await
        .map_err(|e| ChorusError::Memory(format!("upsert persona failed: {e}")))?;
        Ok(())
    }

    /// Delete a persona. Returns whether a row was removed.
    pub async fn delete_persona(&self, name: &str) -> Result<bool, ChorusError> {
        let result = sqlx::query("DELETE FROM personas WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| ChorusError::Memory(format!("delete persona failed: {e}")))?;
        Ok(result.rows_affected() > 0)
    }
}
