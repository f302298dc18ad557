use rand::Rng;
use serde::Serialize;

pub const MAX_SEED: i64 = 2_147_483_647;

const PROMPT: &str =
    "illustration of a cute child, magical storybook style, vibrant, high quality, disney style";
const NEGATIVE_PROMPT: &str = "(lowres, low quality, worst quality:1.2), (text:1.2), watermark, \
     (frame:1.2), deformed, ugly, deformed eyes, blur, out of focus, blurry, deformed cat, \
     deformed, photo, anthropomorphic cat, monochrome, pet collar, gun, weapon, blue, 3d, \
     drones, drone, buildings in background, green";

/// Knobs sent verbatim to the hosted model. Everything but the seed is fixed.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationParams {
    pub prompt: String,
    pub negative_prompt: String,
    pub style_name: String,
    pub num_steps: u32,
    pub identitynet_strength_ratio: f64,
    pub adapter_strength_ratio: f64,
    pub canny_strength: f64,
    pub depth_strength: f64,
    pub controlnet_selection: Vec<String>,
    pub guidance_scale: f64,
    pub seed: i64,
    pub scheduler: String,
    pub enable_lcm: bool,
    pub enhance_face_region: bool,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            prompt: PROMPT.to_string(),
            negative_prompt: NEGATIVE_PROMPT.to_string(),
            style_name: "Watercolor".to_string(),
            num_steps: 30,
            identitynet_strength_ratio: 0.8,
            adapter_strength_ratio: 0.8,
            canny_strength: 0.4,
            depth_strength: 0.4,
            controlnet_selection: vec!["depth".to_string()],
            guidance_scale: 5.0,
            seed: 0,
            scheduler: "EulerDiscreteScheduler".to_string(),
            enable_lcm: false,
            enhance_face_region: true,
        }
    }
}

impl GenerationParams {
    /// Service defaults with a fresh seed, so repeated uploads yield variants.
    pub fn with_random_seed() -> Self {
        Self {
            seed: rand::thread_rng().gen_range(0..=MAX_SEED),
            ..Self::default()
        }
    }

    /// Positional arguments following the two image inputs of the remote endpoint.
    pub fn positional_args(&self) -> Vec<serde_json::Value> {
        use serde_json::json;

        vec![
            json!(self.prompt),
            json!(self.negative_prompt),
            json!(self.style_name),
            json!(self.num_steps),
            json!(self.identitynet_strength_ratio),
            json!(self.adapter_strength_ratio),
            json!(self.canny_strength),
            json!(self.depth_strength),
            json!(self.controlnet_selection),
            json!(self.guidance_scale),
            json!(self.seed),
            json!(self.scheduler),
            json!(self.enable_lcm),
            json!(self.enhance_face_region),
        ]
    }
}
