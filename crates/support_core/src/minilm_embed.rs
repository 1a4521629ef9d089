use anyhow::{anyhow, Result};
use candle_core::{DType, Device, Module, Tensor, D};
use candle_nn::{Embedding, LayerNorm, Linear, VarBuilder};
use std::path::Path;
use tokenizers::{Tokenizer, TruncationParams};

use crate::embed::EmbeddingProvider;

/// sentence-transformers caps all-MiniLM-L6-v2 inputs at 256 word pieces.
const MAX_SEQ_LEN: usize = 256;

// all-MiniLM-L6-v2
const HIDDEN: usize = 384;
const INTERMEDIATE: usize = 1536;
const HEADS: usize = 12;
const LAYERS: usize = 6;
const VOCAB: usize = 30522;
const MAX_POSITIONS: usize = 512;
const TYPE_VOCAB: usize = 2;
const LN_EPS: f64 = 1e-12;

struct EncoderLayer {
    query: Linear,
    key: Linear,
    value: Linear,
    attn_out: Linear,
    attn_norm: LayerNorm,
    up: Linear,
    down: Linear,
    ffn_norm: LayerNorm,
}

impl EncoderLayer {
    fn load(vb: VarBuilder) -> Result<Self> {
        let attn = vb.pp("attention");
        Ok(Self {
            query: candle_nn::linear(HIDDEN, HIDDEN, attn.pp("self.query"))?,
            key: candle_nn::linear(HIDDEN, HIDDEN, attn.pp("self.key"))?,
            value: candle_nn::linear(HIDDEN, HIDDEN, attn.pp("self.value"))?,
            attn_out: candle_nn::linear(HIDDEN, HIDDEN, attn.pp("output.dense"))?,
            attn_norm: candle_nn::layer_norm(HIDDEN, LN_EPS, attn.pp("output.LayerNorm"))?,
            up: candle_nn::linear(HIDDEN, INTERMEDIATE, vb.pp("intermediate.dense"))?,
            down: candle_nn::linear(INTERMEDIATE, HIDDEN, vb.pp("output.dense"))?,
            ffn_norm: candle_nn::layer_norm(HIDDEN, LN_EPS, vb.pp("output.LayerNorm"))?,
        })
    }

    fn split_heads(&self, x: &Tensor, seq_len: usize) -> Result<Tensor> {
        let head_dim = HIDDEN / HEADS;
        Ok(x.reshape((1, seq_len, HEADS, head_dim))?
            .transpose(1, 2)?
            .contiguous()?)
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (_, seq_len, _) = x.dims3()?;
        let head_dim = HIDDEN / HEADS;

        let q = self.split_heads(&self.query.forward(x)?, seq_len)?;
        let k = self.split_heads(&self.key.forward(x)?, seq_len)?;
        let v = self.split_heads(&self.value.forward(x)?, seq_len)?;

        let scores = q
            .matmul(&k.t()?)?
            .affine(1.0 / (head_dim as f64).sqrt(), 0.0)?;
        let weights = candle_nn::ops::softmax(&scores, D::Minus1)?;
        let context = weights
            .matmul(&v)?
            .transpose(1, 2)?
            .contiguous()?
            .reshape((1, seq_len, HIDDEN))?;

        let x = self.attn_norm.forward(&(x + self.attn_out.forward(&context)?)?)?;
        let h = self.down.forward(&self.up.forward(&x)?.gelu_erf()?)?;
        Ok(self.ffn_norm.forward(&(&x + h)?)?)
    }
}

struct Encoder {
    words: Embedding,
    positions: Embedding,
    token_types: Embedding,
    norm: LayerNorm,
    layers: Vec<EncoderLayer>,
    device: Device,
}

impl Encoder {
    fn load(path: &Path, device: Device) -> Result<Self> {
        // SAFETY: the weights file is mapped read-only and not modified while loaded.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[path], DType::F32, &device)? };
        let emb = vb.pp("embeddings");

        let layers = (0..LAYERS)
            .map(|i| EncoderLayer::load(vb.pp(format!("encoder.layer.{i}"))))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            words: candle_nn::embedding(VOCAB, HIDDEN, emb.pp("word_embeddings"))?,
            positions: candle_nn::embedding(MAX_POSITIONS, HIDDEN, emb.pp("position_embeddings"))?,
            token_types: candle_nn::embedding(TYPE_VOCAB, HIDDEN, emb.pp("token_type_embeddings"))?,
            norm: candle_nn::layer_norm(HIDDEN, LN_EPS, emb.pp("LayerNorm"))?,
            layers,
            device,
        })
    }

    /// Mean-pooled sentence vector, not normalized.
    fn forward(&self, token_ids: &[u32]) -> Result<Vec<f32>> {
        let seq_len = token_ids.len();
        let ids = Tensor::new(token_ids, &self.device)?;
        let positions = Tensor::arange(0u32, seq_len as u32, &self.device)?;
        let types = Tensor::zeros(seq_len, DType::U32, &self.device)?;

        let embedded = ((self.words.forward(&ids)? + self.positions.forward(&positions)?)?
            + self.token_types.forward(&types)?)?;
        let mut hidden = self.norm.forward(&embedded)?.unsqueeze(0)?;

        for layer in &self.layers {
            hidden = layer.forward(&hidden)?;
        }

        Ok(hidden.mean(1)?.squeeze(0)?.to_vec1::<f32>()?)
    }
}

/// all-MiniLM-L6-v2 sentence encoder running on CPU.
pub struct MiniLmEmbeddingProvider {
    encoder: Encoder,
    tokenizer: Tokenizer,
}

impl MiniLmEmbeddingProvider {
    pub fn load(model_path: &Path, tokenizer_path: &Path) -> Result<Self> {
        let encoder = Encoder::load(model_path, Device::Cpu)?;

        let mut tokenizer =
            Tokenizer::from_file(tokenizer_path).map_err(|e| anyhow!("load tokenizer: {e}"))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQ_LEN,
                ..Default::default()
            }))
            .map_err(|e| anyhow!("configure truncation: {e}"))?;

        Ok(Self { encoder, tokenizer })
    }
}

impl EmbeddingProvider for MiniLmEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow!("tokenize: {e}"))?;
        self.encoder.forward(encoding.get_ids())
    }

    fn name(&self) -> &str {
        "all-MiniLM-L6-v2"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::l2_normalize;

    fn model_files() -> Option<(std::path::PathBuf, std::path::PathBuf)> {
        let base = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../models");
        let model = base.join("all-MiniLM-L6-v2.safetensors");
        let tokenizer = base.join("all-MiniLM-L6-v2-tokenizer.json");
        (model.exists() && tokenizer.exists()).then_some((model, tokenizer))
    }

    #[test]
    fn related_questions_score_higher() {
        let Some((model, tokenizer)) = model_files() else {
            eprintln!("Skipping: all-MiniLM-L6-v2 model or tokenizer not found");
            return;
        };
        let provider = MiniLmEmbeddingProvider::load(&model, &tokenizer).unwrap();

        let embed = |text: &str| {
            let mut v = provider.embed(text).unwrap();
            l2_normalize(&mut v);
            v
        };
        let reset = embed("How do I reset my password?");
        let forgot = embed("I forgot my password, how can I sign in again?");
        let weather = embed("What is the weather like in Tokyo?");
        assert_eq!(reset.len(), HIDDEN);

        let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
        assert!(dot(&reset, &forgot) > dot(&reset, &weather));
    }

    #[test]
    fn long_input_is_truncated() {
        let Some((model, tokenizer)) = model_files() else {
            eprintln!("Skipping: all-MiniLM-L6-v2 model or tokenizer not found");
            return;
        };
        let provider = MiniLmEmbeddingProvider::load(&model, &tokenizer).unwrap();
        let long = "leave policy ".repeat(600);
        assert_eq!(provider.embed(&long).unwrap().len(), HIDDEN);
    }
}
