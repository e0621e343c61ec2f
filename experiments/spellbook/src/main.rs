use {
    spell_infer::{
        sampling::{
            MAX_LENGTH_RANGE, TEMPERATURE_RANGE, TOP_K_RANGE, TOP_P_RANGE,
        },
        InferError, Inference,
    },
    spellgen::{SamplingConfig, Settings, SpellError, SpellPipeline},
    std::{io::Write, sync::Arc},
};

fn select_inference(settings: &Settings) -> Result<Inference, SpellError> {
    match settings.cuda_device {
        #[cfg(feature = "cuda")]
        Some(ordinal) => Ok(Inference::cuda(ordinal)?),
        #[cfg(not(feature = "cuda"))]
        Some(ordinal) => {
            log::warn!("CUDA device {} requested but built without the cuda feature", ordinal);
            Ok(Inference::cpu())
        }
        None => Ok(Inference::cpu()),
    }
}

fn print_help() {
    println!("Enter a spell name to describe it, or an empty line for a random spell.");
    println!("  /temp <{:?}>   sampling temperature", TEMPERATURE_RANGE);
    println!("  /topk <{:?}>   top-k cutoff, 0 disables", TOP_K_RANGE);
    println!("  /topp <{:?}>   nucleus cutoff", TOP_P_RANGE);
    println!("  /len <{:?}>    maximum length in tokens", MAX_LENGTH_RANGE);
    println!("  /seed <n>      fixed seed, /seed off for random");
    println!("  /show          current settings");
    println!("Ctrl+D to exit.\n");
}

/// Apply a `/command value` line to `config`. Returns a message for the user.
fn apply_command(config: &mut SamplingConfig, line: &str) -> String {
    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or_default();
    let value = parts.next().unwrap_or_default();

    match command {
        "/temp" => match value.parse::<f64>() {
            Ok(v) if TEMPERATURE_RANGE.contains(&v) => {
                config.temperature = v;
                format!("temperature = {}", v)
            }
            _ => format!("temperature must be within {:?}", TEMPERATURE_RANGE),
        },
        "/topk" => match value.parse::<i64>() {
            Ok(v) if TOP_K_RANGE.contains(&v) => {
                config.top_k = v;
                format!("top_k = {}", v)
            }
            _ => format!("top_k must be within {:?}", TOP_K_RANGE),
        },
        "/topp" => match value.parse::<f64>() {
            Ok(v) if TOP_P_RANGE.contains(&v) => {
                config.top_p = v;
                format!("top_p = {}", v)
            }
            _ => format!("top_p must be within {:?}", TOP_P_RANGE),
        },
        "/len" => match value.parse::<usize>() {
            Ok(v) if MAX_LENGTH_RANGE.contains(&v) => {
                config.max_length = v;
                format!("max_length = {}", v)
            }
            _ => format!("max_length must be within {:?}", MAX_LENGTH_RANGE),
        },
        "/seed" => match value {
            "off" => {
                config.seed = None;
                "seed = random".to_string()
            }
            _ => match value.parse::<u64>() {
                Ok(v) => {
                    config.seed = Some(v);
                    format!("seed = {}", v)
                }
                Err(_) => "seed must be an unsigned integer or \"off\"".to_string(),
            },
        },
        "/show" => format!("{:?}", config),
        _ => format!("unknown command: {}", command),
    }
}

#[tokio::main]
async fn main() -> Result<(), SpellError> {
    spell_base::init_stderr_logger();

    let settings = Settings::from_env()?;
    log::debug!("{:?}", settings);

    println!("Loading {}...", settings.spell_model);
    let inference = select_inference(&settings)?;
    let pipeline = Arc::new(SpellPipeline::from_settings(&settings, &inference).await?);
    println!("Spellbook ready.");
    print_help();

    let mut config = SamplingConfig::default();

    loop {
        print!("> ");
        std::io::stdout().flush().map_err(InferError::from)?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input).map_err(InferError::from)?;
        if input.is_empty() {
            break;
        }

        let input = input.trim().to_string();
        if input.starts_with('/') {
            println!("{}", apply_command(&mut config, &input));
            continue;
        }

        let pipeline = pipeline.clone();
        let request = config;
        let result = tokio::task::spawn_blocking(move || {
            if input.is_empty() {
                pipeline.random_spell(&request).map(|spell| spell.description)
            } else {
                pipeline.describe(&input, &request)
            }
        })
        .await
        .map_err(|e| InferError::Runtime(format!("Task join error: {}", e)))?;

        match result {
            Ok(text) => println!("\n{}\n", text),
            // Bad knobs are reported and the session continues.
            Err(SpellError::Infer(InferError::Generation(msg))) => println!("{}", msg),
            Err(err) => return Err(err),
        }
    }

    Ok(())
}
