// GPT-2 decoder on candle-nn.
// Weight names follow the Hugging Face GPT2LMHeadModel checkpoints.

use super::Gpt2Config;
use candle_core::{Device, IndexOp, Module, Result, Tensor};
use candle_nn::{Embedding, LayerNorm, VarBuilder, embedding, init, layer_norm};

/// Linear layer with the transposed `[in, out]` weight layout GPT-2 uses.
#[derive(Debug)]
struct Conv1D {
    weight: Tensor,
    bias: Tensor,
}

impl Conv1D {
    fn load(vb: VarBuilder, n_in: usize, n_out: usize) -> Result<Self> {
        let weight = vb.get_with_hints((n_in, n_out), "weight", init::DEFAULT_KAIMING_NORMAL)?;
        let bias = vb.get_with_hints(n_out, "bias", init::ZERO)?;
        Ok(Self { weight, bias })
    }
}

impl Module for Conv1D {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        xs.broadcast_matmul(&self.weight)?.broadcast_add(&self.bias)
    }
}

/// Per-call key/value cache.
///
/// Each generation call owns one, so a loaded model never carries state
/// from one request into the next.
#[derive(Debug)]
pub struct Cache {
    kvs: Vec<Option<(Tensor, Tensor)>>,
    seq_len: usize,
}

impl Cache {
    pub fn new(n_layer: usize) -> Self {
        Self {
            kvs: vec![None; n_layer],
            seq_len: 0,
        }
    }

    /// Number of positions already processed.
    pub fn seq_len(&self) -> usize {
        self.seq_len
    }
}

#[derive(Debug)]
struct Attention {
    c_attn: Conv1D,
    c_proj: Conv1D,
    n_head: usize,
    head_dim: usize,
}

impl Attention {
    fn load(vb: VarBuilder, config: &Gpt2Config) -> Result<Self> {
        let n_embd = config.n_embd;
        Ok(Self {
            c_attn: Conv1D::load(vb.pp("c_attn"), n_embd, 3 * n_embd)?,
            c_proj: Conv1D::load(vb.pp("c_proj"), n_embd, n_embd)?,
            n_head: config.n_head,
            head_dim: config.head_dim(),
        })
    }

    fn forward(
        &self,
        xs: &Tensor,
        kv: &mut Option<(Tensor, Tensor)>,
        mask: Option<&Tensor>,
    ) -> Result<Tensor> {
        let (b, t, c) = xs.dims3()?;
        let qkv = self.c_attn.forward(xs)?;
        let split = |i: usize| -> Result<Tensor> {
            qkv.narrow(2, i * c, c)?
                .reshape((b, t, self.n_head, self.head_dim))?
                .transpose(1, 2)?
                .contiguous()
        };
        let q = split(0)?;
        let mut k = split(1)?;
        let mut v = split(2)?;

        if let Some((past_k, past_v)) = kv.as_ref() {
            k = Tensor::cat(&[past_k, &k], 2)?;
            v = Tensor::cat(&[past_v, &v], 2)?;
        }
        *kv = Some((k.clone(), v.clone()));

        let scale = 1.0 / (self.head_dim as f64).sqrt();
        let att = (q.matmul(&k.t()?.contiguous()?)? * scale)?;
        let att = match mask {
            Some(mask) => att.broadcast_add(mask)?,
            None => att,
        };
        let att = candle_nn::ops::softmax_last_dim(&att)?;
        let ys = att.matmul(&v)?.transpose(1, 2)?.reshape((b, t, c))?;
        self.c_proj.forward(&ys)
    }
}

#[derive(Debug)]
struct Mlp {
    c_fc: Conv1D,
    c_proj: Conv1D,
}

impl Mlp {
    fn load(vb: VarBuilder, n_embd: usize) -> Result<Self> {
        Ok(Self {
            c_fc: Conv1D::load(vb.pp("c_fc"), n_embd, 4 * n_embd)?,
            c_proj: Conv1D::load(vb.pp("c_proj"), 4 * n_embd, n_embd)?,
        })
    }
}

impl Module for Mlp {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        // candle's gelu is the tanh approximation, i.e. GPT-2's gelu_new
        self.c_proj.forward(&self.c_fc.forward(xs)?.gelu()?)
    }
}

#[derive(Debug)]
struct Block {
    ln_1: LayerNorm,
    attn: Attention,
    ln_2: LayerNorm,
    mlp: Mlp,
}

impl Block {
    fn load(vb: VarBuilder, config: &Gpt2Config) -> Result<Self> {
        let eps = config.layer_norm_epsilon;
        Ok(Self {
            ln_1: layer_norm(config.n_embd, eps, vb.pp("ln_1"))?,
            attn: Attention::load(vb.pp("attn"), config)?,
            ln_2: layer_norm(config.n_embd, eps, vb.pp("ln_2"))?,
            mlp: Mlp::load(vb.pp("mlp"), config.n_embd)?,
        })
    }

    fn forward(
        &self,
        xs: &Tensor,
        kv: &mut Option<(Tensor, Tensor)>,
        mask: Option<&Tensor>,
    ) -> Result<Tensor> {
        let xs = (xs + self.attn.forward(&self.ln_1.forward(xs)?, kv, mask)?)?;
        &xs + self.mlp.forward(&self.ln_2.forward(&xs)?)?
    }
}

/// GPT-2 language model with the LM head tied to the token embedding.
#[derive(Debug)]
pub struct Gpt2Model {
    wte: Embedding,
    wpe: Embedding,
    blocks: Vec<Block>,
    ln_f: LayerNorm,
    n_positions: usize,
    device: Device,
}

impl Gpt2Model {
    /// Build the network from `vb`.
    ///
    /// Checkpoints saved from `GPT2LMHeadModel` nest everything under
    /// `transformer.`; base checkpoints do not. Both are accepted.
    pub fn load(vb: VarBuilder, config: &Gpt2Config) -> Result<Self> {
        let vb = if vb.contains_tensor("transformer.wte.weight") {
            vb.pp("transformer")
        } else {
            vb
        };
        let n_positions = config.context_length();
        let wte = embedding(config.vocab_size, config.n_embd, vb.pp("wte"))?;
        let wpe = embedding(n_positions, config.n_embd, vb.pp("wpe"))?;
        let blocks = (0..config.n_layer)
            .map(|i| Block::load(vb.pp(format!("h.{i}")), config))
            .collect::<Result<Vec<_>>>()?;
        let ln_f = layer_norm(config.n_embd, config.layer_norm_epsilon, vb.pp("ln_f"))?;
        Ok(Self {
            wte,
            wpe,
            blocks,
            ln_f,
            n_positions,
            device: vb.device().clone(),
        })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Feed `input_ids` (shape `[1, t]`) and return logits for the last
    /// position (shape `[vocab]`).
    pub fn forward(&self, input_ids: &Tensor, cache: &mut Cache) -> Result<Tensor> {
        let (_b, t) = input_ids.dims2()?;
        let past = cache.seq_len;
        if past + t > self.n_positions {
            candle_core::bail!(
                "sequence of {} tokens exceeds the context of {}",
                past + t,
                self.n_positions
            );
        }

        let positions = Tensor::arange(past as u32, (past + t) as u32, &self.device)?.unsqueeze(0)?;
        let mut xs = self
            .wte
            .forward(input_ids)?
            .broadcast_add(&self.wpe.forward(&positions)?)?;

        let mask = if t > 1 {
            Some(causal_mask(t, past, &self.device)?)
        } else {
            None
        };
        for (block, kv) in self.blocks.iter().zip(cache.kvs.iter_mut()) {
            xs = block.forward(&xs, kv, mask.as_ref())?;
        }
        cache.seq_len += t;

        let last = self.ln_f.forward(&xs)?.i((.., t - 1, ..))?.contiguous()?;
        let logits = last.matmul(&self.wte.embeddings().t()?)?;
        logits.squeeze(0)?.to_dtype(candle_core::DType::F32)
    }
}

/// Additive mask hiding future positions for `t` new tokens after `past`
/// cached ones.
fn causal_mask(t: usize, past: usize, device: &Device) -> Result<Tensor> {
    let total = past + t;
    let mask: Vec<f32> = (0..t)
        .flat_map(|i| {
            (0..total).map(move |j| if j > past + i { f32::NEG_INFINITY } else { 0.0 })
        })
        .collect();
    Tensor::from_slice(&mask, (t, total), device)
}
