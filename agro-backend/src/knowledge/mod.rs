//! In-process agricultural knowledge base
//!
//! Keyword-scored retrieval over a small curated corpus of farming topics
//! plus per-crop profiles. Matched snippets are appended to the response
//! prompt so answers stay grounded in Indian farming practice even when no
//! remote tool returned data.

/// General farming topic with retrieval keywords and crop applicability.
struct Topic {
    key: &'static str,
    content: &'static str,
    keywords: &'static [&'static str],
    crops: &'static [&'static str],
}

/// Cultivation profile for one crop.
struct CropProfile {
    name: &'static str,
    sowing_time: &'static str,
    harvesting_time: &'static str,
    soil_requirement: &'static str,
    water_requirement: &'static str,
    common_pests: &'static [&'static str],
    fertilizer_schedule: &'static str,
}

/// Crops recognized when scanning a user message. First match wins, so the
/// more common cereals come first.
pub const CROP_VOCABULARY: &[&str] = &[
    "wheat",
    "rice",
    "cotton",
    "sugarcane",
    "maize",
    "bajra",
    "jowar",
    "barley",
    "gram",
    "peas",
    "mustard",
    "groundnut",
    "soybean",
    "tomato",
    "potato",
    "onion",
];

const TOPICS: &[Topic] = &[
    Topic {
        key: "crop_rotation",
        content: "Crop rotation is the practice of growing different types of crops in the same area across different seasons. Benefits include improved soil health, reduced pest and disease pressure, and better nutrient management.",
        keywords: &["rotation", "different crops", "seasons", "soil health"],
        crops: &["wheat", "rice", "legumes", "cotton"],
    },
    Topic {
        key: "rabi_crops",
        content: "Rabi crops are winter season crops sown in October-December and harvested in March-May. Main rabi crops include wheat, barley, peas, gram, mustard. They require cool weather for growth and warm weather for ripening.",
        keywords: &["rabi", "winter", "wheat", "barley", "cool weather"],
        crops: &["wheat", "barley", "peas", "gram", "mustard"],
    },
    Topic {
        key: "kharif_crops",
        content: "Kharif crops are monsoon season crops sown in June-July and harvested in September-October. Main kharif crops include rice, cotton, sugarcane, maize, bajra. They depend on monsoon rainfall.",
        keywords: &["kharif", "monsoon", "rice", "cotton", "rainfall"],
        crops: &["rice", "cotton", "sugarcane", "maize", "bajra"],
    },
    Topic {
        key: "soil_health",
        content: "Soil health refers to the continued capacity of soil to function as a vital living ecosystem. Key indicators include organic matter content, pH level, nutrient availability (NPK), soil structure, and biological activity.",
        keywords: &["soil", "health", "organic matter", "ph", "npk", "nutrients"],
        crops: &["all"],
    },
    Topic {
        key: "irrigation_methods",
        content: "Common irrigation methods include flood irrigation, sprinkler irrigation, drip irrigation, and furrow irrigation. Drip irrigation is most water-efficient, while flood irrigation is traditional but less efficient.",
        keywords: &["irrigation", "water", "drip", "sprinkler", "flood", "efficient"],
        crops: &["all"],
    },
    Topic {
        key: "pest_management",
        content: "Integrated Pest Management (IPM) combines biological, cultural, physical, and chemical tools to manage pests effectively while minimizing environmental impact. Prevention is better than cure.",
        keywords: &["pest", "ipm", "management", "biological", "chemical", "prevention"],
        crops: &["all"],
    },
    Topic {
        key: "fertilizer_application",
        content: "Balanced fertilizer application based on soil testing is crucial. NPK (Nitrogen, Phosphorus, Potassium) are primary nutrients. Organic fertilizers improve soil structure while chemical fertilizers provide quick nutrients.",
        keywords: &["fertilizer", "npk", "nitrogen", "phosphorus", "potassium", "organic"],
        crops: &["all"],
    },
    Topic {
        key: "water_management",
        content: "Efficient water management includes proper irrigation scheduling, mulching to reduce evaporation, rainwater harvesting, and choosing drought-resistant varieties. Water is precious in agriculture.",
        keywords: &["water", "irrigation", "mulching", "rainwater", "drought", "efficient"],
        crops: &["all"],
    },
];

const CROP_PROFILES: &[CropProfile] = &[
    CropProfile {
        name: "wheat",
        sowing_time: "October-December (Rabi season)",
        harvesting_time: "March-May",
        soil_requirement: "Well-drained loamy soil, pH 6.0-7.5",
        water_requirement: "450-650mm during growing season",
        common_pests: &["aphids", "stem borer", "rust"],
        fertilizer_schedule: "Basal: 60kg N, 30kg P, 20kg K per hectare",
    },
    CropProfile {
        name: "rice",
        sowing_time: "June-July (Kharif season)",
        harvesting_time: "September-October",
        soil_requirement: "Clay or clay loam, pH 5.5-6.5",
        water_requirement: "1200-1500mm, requires standing water",
        common_pests: &["stem borer", "leaf folder", "brown plant hopper"],
        fertilizer_schedule: "120kg N, 60kg P, 40kg K per hectare in splits",
    },
    CropProfile {
        name: "cotton",
        sowing_time: "April-June (Kharif season)",
        harvesting_time: "October-January (multiple picks)",
        soil_requirement: "Deep black cotton soil, pH 6.0-8.0",
        water_requirement: "700-1200mm depending on variety",
        common_pests: &["bollworm", "aphids", "whitefly"],
        fertilizer_schedule: "150kg N, 75kg P, 75kg K per hectare",
    },
];

/// Per-crop query aspects: (aspect name, trigger keywords).
const CROP_ASPECTS: &[(&str, &[&str])] = &[
    ("sowing", &["sow", "planting", "seeding"]),
    ("harvesting", &["harvest", "harvesting", "when to harvest", "maturity"]),
    ("soil", &["soil", "land", "field preparation"]),
    ("water", &["water", "irrigation", "watering"]),
    ("pest", &["pest", "insect", "disease", "problem"]),
    ("fertilizer", &["fertilizer", "nutrient", "feeding", "manure"]),
];

const MAX_HITS: usize = 5;

/// One retrieved knowledge snippet.
#[derive(Debug, Clone)]
pub struct KnowledgeHit {
    pub topic: String,
    pub content: String,
    pub score: f64,
}

/// Retrieval interface over the static corpus.
pub struct KnowledgeBase;

impl KnowledgeBase {
    pub fn new() -> Self {
        KnowledgeBase
    }

    /// First crop from the fixed vocabulary mentioned in the message, if any.
    pub fn extract_crop(&self, message: &str) -> Option<&'static str> {
        let lower = message.to_lowercase();
        CROP_VOCABULARY.iter().find(|c| lower.contains(*c)).copied()
    }

    /// Retrieve up to five snippets relevant to the query, most relevant
    /// first. Keyword hits score 1.0 each, crop applicability adds 0.5,
    /// and crop-specific aspect matches score a flat 2.0.
    pub fn retrieve(&self, query: &str, crop: Option<&str>) -> Vec<KnowledgeHit> {
        let query_lower = query.to_lowercase();
        let mut hits = Vec::new();

        for topic in TOPICS {
            let mut score = 0.0;
            for keyword in topic.keywords {
                if query_lower.contains(keyword) {
                    score += 1.0;
                }
            }
            if let Some(crop) = crop {
                if topic.crops.contains(&crop) || topic.crops.contains(&"all") {
                    score += 0.5;
                }
            }
            if score > 0.0 {
                hits.push(KnowledgeHit {
                    topic: topic.key.to_string(),
                    content: topic.content.to_string(),
                    score,
                });
            }
        }

        if let Some(crop) = crop {
            if let Some(profile) = CROP_PROFILES.iter().find(|p| p.name == crop) {
                for (aspect, keywords) in CROP_ASPECTS {
                    if keywords.iter().any(|k| query_lower.contains(k)) {
                        hits.push(KnowledgeHit {
                            topic: format!("{}_{}", crop, aspect),
                            content: format!(
                                "{} {}: {}",
                                capitalize(crop),
                                aspect,
                                profile.aspect_text(aspect)
                            ),
                            score: 2.0,
                        });
                    }
                }
            }
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(MAX_HITS);
        hits
    }
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::new()
    }
}

impl CropProfile {
    fn aspect_text(&self, aspect: &str) -> String {
        match aspect {
            "sowing" => self.sowing_time.to_string(),
            "harvesting" => self.harvesting_time.to_string(),
            "soil" => self.soil_requirement.to_string(),
            "water" => self.water_requirement.to_string(),
            "pest" => self.common_pests.join(", "),
            "fertilizer" => self.fertilizer_schedule.to_string(),
            _ => String::new(),
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
