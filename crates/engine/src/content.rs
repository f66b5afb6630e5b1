//! Themed copy generation.
//!
//! The generator is a pure capability: same inputs, same copy, no I/O. The
//! built-in [`ThemeTemplates`] covers the recurring retail moments; callers
//! with their own copywriting plug in another implementation.

use thema_core::ads::{GeneratedContent, MAX_DESCRIPTION_LEN, MAX_HEADLINE_LEN, MAX_PATH_LEN};

pub trait ContentGenerator: Send + Sync + 'static {
    /// Produce the themed additions for one creative: extra headlines and
    /// descriptions to append to the existing base copy, plus a display
    /// path segment.
    fn generate(
        &self,
        theme: &str,
        base_headlines: &[String],
        base_description: &str,
    ) -> GeneratedContent;
}

/// Template-driven generator for the built-in themes.
pub struct ThemeTemplates;

impl ThemeTemplates {
    pub fn new() -> Self {
        Self
    }

    fn display_name(theme: &str) -> String {
        match theme {
            "singles_day" => "Singles Day".to_string(),
            "black_friday" => "Black Friday".to_string(),
            "cyber_monday" => "Cyber Monday".to_string(),
            "christmas" => "Christmas".to_string(),
            other => {
                // Title-case unknown theme slugs: "spring_sale" → "Spring Sale".
                other
                    .split('_')
                    .filter(|part| !part.is_empty())
                    .map(|part| {
                        let mut chars = part.chars();
                        match chars.next() {
                            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                            None => String::new(),
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(" ")
            }
        }
    }
}

impl Default for ThemeTemplates {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentGenerator for ThemeTemplates {
    fn generate(
        &self,
        theme: &str,
        base_headlines: &[String],
        base_description: &str,
    ) -> GeneratedContent {
        let display = Self::display_name(theme);

        let headlines: Vec<String> = [
            format!("{display} Deals"),
            format!("Shop {display} Offers"),
            format!("{display}: Order Today"),
        ]
        .into_iter()
        .filter(|h| h.chars().count() <= MAX_HEADLINE_LEN)
        .filter(|h| !base_headlines.contains(h))
        .collect();

        let descriptions: Vec<String> = [
            format!("Discover our best {display} offers. Easy ordering, fast delivery."),
            format!("{display} is here. Don't miss out on this season's deals."),
        ]
        .into_iter()
        .filter(|d| d.chars().count() <= MAX_DESCRIPTION_LEN)
        .filter(|d| d != base_description)
        .collect();

        let path1: String = theme
            .replace('_', "-")
            .chars()
            .take(MAX_PATH_LEN)
            .collect();

        GeneratedContent {
            headlines,
            descriptions,
            path1,
        }
    }
}
