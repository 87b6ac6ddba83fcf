//! Pokémon card widget: a self-fetching, self-rendering display unit keyed
//! by an identifying attribute.
//!
//! Each instance is an explicit state machine:
//!
//! ```text
//! Uninitialized → FetchingPrimary → FetchingSecondary → Rendered
//!                       │                    │
//!                       └→ NotFound          └→ Rendered (flavor omitted)
//! ```
//!
//! `NotFound` and `Rendered` are terminal until `set_identifier` changes the
//! identifier, which restarts the sequence under a new generation. Results
//! from a superseded generation are discarded, never applied — in-flight
//! fetches themselves are not cancelled (known non-cancellation behavior,
//! matching the source).

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::TeamError;
use crate::markup::{escape_html, normalize_identifier};

/// Pokémon type → pill/background color.
pub static TYPE_COLORS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("normal", "#A8A878"),
        ("fire", "#F08030"),
        ("water", "#6890F0"),
        ("electric", "#F8D030"),
        ("grass", "#78C850"),
        ("ice", "#98D8D8"),
        ("fighting", "#C03028"),
        ("poison", "#A040A0"),
        ("ground", "#E0C068"),
        ("flying", "#A890F0"),
        ("psychic", "#F85888"),
        ("bug", "#A8B820"),
        ("rock", "#B8A038"),
        ("ghost", "#705898"),
        ("dragon", "#7038F8"),
        ("dark", "#705848"),
        ("steel", "#B8B8D0"),
        ("fairy", "#EE99AC"),
    ])
});

pub const DEFAULT_TYPE_COLOR: &str = "#888888";

/// Number of leading base stats shown on a card.
const STAT_COUNT: usize = 3;

pub fn type_color(name: &str) -> &'static str {
    TYPE_COLORS.get(name).copied().unwrap_or(DEFAULT_TYPE_COLOR)
}

// -- PokeAPI record types ---------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct NamedResource {
    pub name: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Artwork {
    #[serde(default)]
    pub front_default: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpriteSet {
    #[serde(rename = "official-artwork", default)]
    pub official_artwork: Option<Artwork>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sprites {
    #[serde(default)]
    pub front_default: Option<String>,
    #[serde(default)]
    pub other: Option<SpriteSet>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TypeSlot {
    #[serde(rename = "type")]
    pub kind: NamedResource,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatSlot {
    pub base_stat: u32,
    pub stat: NamedResource,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpeciesRef {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pokemon {
    pub id: u32,
    pub name: String,
    pub sprites: Sprites,
    pub types: Vec<TypeSlot>,
    pub stats: Vec<StatSlot>,
    pub species: SpeciesRef,
}

impl Pokemon {
    /// Preferred artwork, falling back to the plain front sprite.
    pub fn artwork_url(&self) -> Option<&str> {
        self.sprites
            .other
            .as_ref()
            .and_then(|o| o.official_artwork.as_ref())
            .and_then(|a| a.front_default.as_deref())
            .or(self.sprites.front_default.as_deref())
    }

    pub fn primary_type(&self) -> Option<&str> {
        self.types.first().map(|t| t.kind.name.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlavorTextEntry {
    pub flavor_text: String,
    pub language: NamedResource,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Species {
    #[serde(default)]
    pub flavor_text_entries: Vec<FlavorTextEntry>,
}

impl Species {
    /// First English flavor text, form feeds normalized to spaces.
    pub fn english_flavor_text(&self) -> Option<String> {
        self.flavor_text_entries
            .iter()
            .find(|entry| entry.language.name == "en")
            .map(|entry| entry.flavor_text.replace('\u{c}', " "))
    }
}

// -- Instance state machine -------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardPhase {
    Uninitialized,
    FetchingPrimary,
    FetchingSecondary,
    Rendered,
    NotFound,
}

/// Outcome of one step of a card's fetch sequence.
#[derive(Debug)]
pub enum CardOutcome {
    /// Primary record fetched; the species fetch is underway.
    PrimaryOk,
    /// Primary fetch failed — terminal, no secondary fetch was issued.
    NotFound,
    /// Fetch sequence finished. `flavor` is None when the secondary fetch
    /// failed or had no English entry.
    Loaded {
        pokemon: Box<Pokemon>,
        flavor: Option<String>,
    },
}

/// A fetch to start for a (re)bound card instance.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub key: String,
    pub generation: u64,
}

/// A fetch result routed back to the render loop.
#[derive(Debug)]
pub struct CardUpdate {
    pub key: String,
    pub generation: u64,
    pub outcome: CardOutcome,
}

#[derive(Debug)]
pub struct CardInstance {
    id: u64,
    identifier: String,
    generation: u64,
    phase: CardPhase,
    html: String,
}

impl CardInstance {
    fn new(id: u64, identifier: &str) -> Self {
        let identifier = normalize_identifier(identifier);
        CardInstance {
            id,
            html: loading_html(&identifier),
            identifier,
            generation: 0,
            phase: CardPhase::Uninitialized,
        }
    }

    pub fn instance_id(&self) -> u64 {
        self.id
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn phase(&self) -> CardPhase {
        self.phase
    }

    /// Most recently rendered output.
    pub fn html(&self) -> &str {
        &self.html
    }

    /// Enter `FetchingPrimary` for the current identifier, returning the
    /// generation the caller must attach to the fetch.
    pub fn begin_fetch(&mut self) -> u64 {
        self.phase = CardPhase::FetchingPrimary;
        self.html = loading_html(&self.identifier);
        self.generation
    }

    /// Rebind to a new identifier. Returns the new fetch generation, or
    /// None when the normalized identifier is unchanged (no refetch).
    pub fn set_identifier(&mut self, value: &str) -> Option<u64> {
        let normalized = normalize_identifier(value);
        if normalized == self.identifier {
            return None;
        }
        self.identifier = normalized;
        self.generation += 1;
        Some(self.begin_fetch())
    }

    /// Apply a fetch outcome. Returns true when the rendered output
    /// changed. Outcomes from a superseded generation are discarded.
    pub fn apply_outcome(&mut self, generation: u64, outcome: CardOutcome) -> bool {
        if generation != self.generation {
            debug!(
                identifier = %self.identifier,
                stale = generation,
                current = self.generation,
                "discarding stale card fetch result"
            );
            return false;
        }
        match outcome {
            CardOutcome::PrimaryOk => {
                if self.phase == CardPhase::FetchingPrimary {
                    self.phase = CardPhase::FetchingSecondary;
                }
                false
            }
            CardOutcome::NotFound => {
                if self.is_fetching() {
                    self.phase = CardPhase::NotFound;
                    self.html = not_found_html();
                    true
                } else {
                    false
                }
            }
            CardOutcome::Loaded { pokemon, flavor } => {
                if self.is_fetching() {
                    self.phase = CardPhase::Rendered;
                    self.html = render_card(&pokemon, flavor.as_deref());
                    true
                } else {
                    false
                }
            }
        }
    }

    fn is_fetching(&self) -> bool {
        matches!(
            self.phase,
            CardPhase::FetchingPrimary | CardPhase::FetchingSecondary
        )
    }
}

// -- Registry ---------------------------------------------------------------

/// Card instances keyed by normalized identifier. At most one instance
/// exists per identifier; duplicate tags in a document share it.
#[derive(Debug, Default)]
pub struct CardRegistry {
    instances: HashMap<String, CardInstance>,
    next_instance_id: u64,
}

impl CardRegistry {
    pub fn new() -> Self {
        CardRegistry::default()
    }

    pub fn get(&self, key: &str) -> Option<&CardInstance> {
        self.instances.get(key)
    }

    pub fn html_for(&self, key: &str) -> Option<&str> {
        self.instances.get(key).map(|inst| inst.html())
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Align the registry with the identifiers present in the document.
    /// Instances for absent identifiers are dropped (a removed instance may
    /// be rebound to a newly present identifier via `set_identifier`);
    /// newly present identifiers get an instance whose fetch the caller
    /// must start.
    pub fn sync(&mut self, present: &[String]) -> Vec<FetchRequest> {
        let absent: Vec<String> = self
            .instances
            .keys()
            .filter(|key| !present.contains(*key))
            .cloned()
            .collect();
        let mut spare = Vec::new();
        for key in absent {
            if let Some(instance) = self.instances.remove(&key) {
                spare.push(instance);
            }
        }

        let mut requests = Vec::new();
        for key in present {
            if self.instances.contains_key(key) {
                continue;
            }
            let (generation, instance) = match spare.pop() {
                Some(mut instance) => {
                    let generation = instance
                        .set_identifier(key)
                        .unwrap_or_else(|| instance.begin_fetch());
                    (generation, instance)
                }
                None => {
                    let mut instance = CardInstance::new(self.next_instance_id, key);
                    self.next_instance_id += 1;
                    let generation = instance.begin_fetch();
                    (generation, instance)
                }
            };
            self.instances.insert(key.clone(), instance);
            requests.push(FetchRequest {
                key: key.clone(),
                generation,
            });
        }
        requests
    }

    /// Route a fetch result to its instance. Results for detached
    /// instances are discarded (the document no longer shows them).
    pub fn apply(&mut self, update: CardUpdate) -> bool {
        match self.instances.get_mut(&update.key) {
            Some(instance) => instance.apply_outcome(update.generation, update.outcome),
            None => {
                debug!(key = %update.key, "card update for detached instance discarded");
                false
            }
        }
    }
}

// -- Fetch task -------------------------------------------------------------

/// Run one card's fetch sequence, reporting outcomes through `tx`.
///
/// A primary failure is terminal: no secondary fetch is issued. A secondary
/// failure degrades to a card without flavor text.
pub async fn run_card_fetch(
    client: reqwest::Client,
    base: String,
    request: FetchRequest,
    tx: mpsc::UnboundedSender<CardUpdate>,
) {
    let FetchRequest { key, generation } = request;
    let url = format!("{}/{}", base.trim_end_matches('/'), key);

    let pokemon = match fetch_json::<Pokemon>(&client, &url).await {
        Ok(pokemon) => pokemon,
        Err(e) => {
            warn!(key = %key, error = %e, "primary card fetch failed");
            let _ = tx.send(CardUpdate {
                key,
                generation,
                outcome: CardOutcome::NotFound,
            });
            return;
        }
    };
    let _ = tx.send(CardUpdate {
        key: key.clone(),
        generation,
        outcome: CardOutcome::PrimaryOk,
    });

    let flavor = match fetch_json::<Species>(&client, &pokemon.species.url).await {
        Ok(species) => species.english_flavor_text(),
        Err(e) => {
            debug!(key = %key, error = %e, "species fetch failed; omitting flavor text");
            None
        }
    };
    let _ = tx.send(CardUpdate {
        key,
        generation,
        outcome: CardOutcome::Loaded {
            pokemon: Box::new(pokemon),
            flavor,
        },
    });
}

async fn fetch_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> Result<T, TeamError> {
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(TeamError::Fetch {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }
    Ok(response.json::<T>().await?)
}

// -- Rendering --------------------------------------------------------------

fn scope_class(identifier: &str) -> String {
    let safe: String = identifier
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    format!("pc-{}", safe)
}

pub fn loading_html(identifier: &str) -> String {
    format!(
        "<div class=\"pokemon-card-loading\" style=\"font-style:italic;color:#8b949e;margin:10px\">Summoning {}\u{2026}</div>",
        escape_html(identifier)
    )
}

pub fn not_found_html() -> String {
    "<div class=\"pokemon-card-missing\" style=\"color:#f85149;margin:10px\">Pok\u{e9}mon not found</div>".to_string()
}

/// Render the full card. Styling is carried inside the card markup, scoped
/// by a per-identifier class so it cannot leak into the page.
pub fn render_card(pokemon: &Pokemon, flavor: Option<&str>) -> String {
    let scope = scope_class(&pokemon.name);
    let bg = pokemon
        .primary_type()
        .map(type_color)
        .unwrap_or(DEFAULT_TYPE_COLOR);

    let style = format!(
        "<style>\
         .{scope}{{width:250px;border-radius:10px;padding:15px;margin:10px;\
box-shadow:0 4px 8px rgba(0,0,0,0.2);display:flex;flex-direction:column;align-items:center;\
background:linear-gradient(to bottom, {bg}, white);font-family:Arial,sans-serif}}\
         .{scope} .card-header{{width:100%;display:flex;justify-content:space-between;align-items:center;margin-bottom:10px}}\
         .{scope} .card-name{{font-size:1.4em;font-weight:bold;text-transform:capitalize;margin:0;color:#333}}\
         .{scope} .card-id{{font-size:1em;color:#666}}\
         .{scope} .card-image{{width:120px;height:120px;margin:10px 0}}\
         .{scope} .card-types{{display:flex;gap:10px;margin:5px 0}}\
         .{scope} .card-type{{padding:5px 10px;border-radius:15px;font-size:0.8em;font-weight:bold;color:white;text-transform:capitalize}}\
         .{scope} .card-stats{{width:100%;margin-top:10px}}\
         .{scope} .card-stat{{display:flex;justify-content:space-between;margin:3px 0;font-size:0.8em}}\
         .{scope} .card-stat-name{{color:#555;text-transform:capitalize}}\
         .{scope} .card-flavor{{font-style:italic;font-size:0.9em;margin-top:10px;color:#555;text-align:center}}\
         </style>"
    );

    let image = pokemon
        .artwork_url()
        .map(|url| {
            format!(
                "<img class=\"card-image\" src=\"{}\" alt=\"{}\">",
                escape_html(url),
                escape_html(&pokemon.name)
            )
        })
        .unwrap_or_default();

    let types: String = pokemon
        .types
        .iter()
        .map(|slot| {
            format!(
                "<span class=\"card-type\" style=\"background-color:{}\">{}</span>",
                type_color(&slot.kind.name),
                escape_html(&slot.kind.name)
            )
        })
        .collect();

    let stats: String = pokemon
        .stats
        .iter()
        .take(STAT_COUNT)
        .map(|slot| {
            format!(
                "<div class=\"card-stat\"><span class=\"card-stat-name\">{}</span><span class=\"card-stat-value\">{}</span></div>",
                escape_html(&slot.stat.name.replace('-', " ")),
                slot.base_stat
            )
        })
        .collect();

    let flavor = flavor
        .map(|text| format!("<p class=\"card-flavor\">{}</p>", escape_html(text)))
        .unwrap_or_default();

    format!(
        "<div class=\"pokemon-card {scope}\">{style}\
         <div class=\"card-header\"><h2 class=\"card-name\">{name}</h2><span class=\"card-id\">#{id}</span></div>\
         {image}\
         <div class=\"card-types\">{types}</div>\
         <div class=\"card-stats\">{stats}</div>\
         {flavor}\
         </div>",
        name = escape_html(&pokemon.name),
        id = pokemon.id,
    )
}
