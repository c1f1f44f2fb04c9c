//! crates/agrigenius_core/src/market.rs
//!
//! The static market hub catalogue: reference crop prices, where to buy
//! inputs, and government seed schemes. Names are translation keys.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
    Stable,
}

impl Trend {
    pub fn arrow(self) -> &'static str {
        match self {
            Trend::Up => "▲",
            Trend::Down => "▼",
            Trend::Stable => "▬",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropPrice {
    pub name_key: &'static str,
    pub price: &'static str,
    pub trend: Trend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgriInput {
    pub name_key: &'static str,
    pub link: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedScheme {
    pub name_key: &'static str,
    pub scheme: &'static str,
}

pub const CROP_PRICES: &[CropPrice] = &[
    CropPrice { name_key: "wheat", price: "₹2,275/quintal", trend: Trend::Up },
    CropPrice { name_key: "paddy", price: "₹2,183/quintal", trend: Trend::Stable },
    CropPrice { name_key: "maize", price: "₹2,090/quintal", trend: Trend::Down },
    CropPrice { name_key: "cotton", price: "₹7,020/quintal", trend: Trend::Up },
    CropPrice { name_key: "soybean", price: "₹4,650/quintal", trend: Trend::Down },
    CropPrice { name_key: "sugarcane", price: "₹315/quintal", trend: Trend::Stable },
];

pub const AGRI_INPUTS: &[AgriInput] = &[
    AgriInput { name_key: "ureaFertilizer", link: "https://www.amazon.in/s?k=urea+fertilizer+for+plants" },
    AgriInput { name_key: "dapFertilizer", link: "https://www.amazon.in/s?k=dap+fertilizer" },
    AgriInput { name_key: "potash", link: "https://www.amazon.in/s?k=potash+fertilizer" },
    AgriInput { name_key: "neemOilPesticide", link: "https://www.amazon.in/s?k=neem+oil+pesticide" },
    AgriInput { name_key: "organicFungicide", link: "https://www.amazon.in/s?k=organic+fungicide" },
    AgriInput { name_key: "vegetableSeeds", link: "https://www.amazon.in/s?k=vegetable+seeds" },
];

pub const SEED_SCHEMES: &[SeedScheme] = &[
    SeedScheme { name_key: "wheat", scheme: "National Food Security Mission" },
    SeedScheme { name_key: "paddy", scheme: "National Food Security Mission" },
    SeedScheme { name_key: "maize", scheme: "Integrated Maize Development Programme" },
    SeedScheme { name_key: "barley", scheme: "Rashtriya Krishi Vikas Yojana" },
];
