// ============================================================
// Layer 5 — AutoVC Model
// ============================================================
// Encoder  : [mel ; speaker emb] → 3 × conv/bn/relu → 2 × BiLSTM
//            → down-sample every `freq` frames → content codes
// Decoder  : [up-sampled codes ; target emb] → LSTM → 3 × conv/bn/relu
//            → 2 × LSTM → linear → mel (rec_org)
// Postnet  : 5 × conv/bn (tanh between) → residual added to rec_org
//
// Speaker identity reaches the decoder only through the target
// embedding; the codes are limited to 2 * dim_neck values per
// `freq` frames.
//
// Reference: Qian et al. (2019) AutoVC: Zero-Shot Voice Style
//            Transfer with Only Autoencoder Loss

use anyhow::{ensure, Result};
use burn::{
    nn::{
        conv::{Conv1d, Conv1dConfig},
        loss::{MseLoss, Reduction},
        BatchNorm, BatchNormConfig, BiLstm, BiLstmConfig, Linear, LinearConfig, Lstm,
        LstmConfig, PaddingConfig1d,
    },
    prelude::*,
    tensor::activation::relu,
};
use serde::{Deserialize, Serialize};

const KERNEL_SIZE: usize = 5;
const ENCODER_CONVS: usize = 3;
const DECODER_CONVS: usize = 3;
const POSTNET_CONVS: usize = 5;

/// Architecture hyperparameters, read from the YAML config file.
/// Missing keys fall back to the published AutoVC sizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoVcConfig {
    /// Hidden size of each encoder LSTM direction
    pub dim_neck: usize,
    /// Speaker embedding length
    pub dim_emb:  usize,
    /// Decoder pre-net LSTM / conv width
    pub dim_pre:  usize,
    /// Down-sampling factor of the content codes
    pub freq:     usize,
    pub n_mels:   usize,
    /// Encoder and postnet conv width
    pub dim_conv: usize,
    /// Decoder output LSTM width
    pub dim_dec:  usize,
}

impl Default for AutoVcConfig {
    fn default() -> Self {
        Self {
            dim_neck: 32,
            dim_emb:  256,
            dim_pre:  512,
            freq:     32,
            n_mels:   80,
            dim_conv: 512,
            dim_dec:  1024,
        }
    }
}

impl AutoVcConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("dim_neck", self.dim_neck),
            ("dim_emb", self.dim_emb),
            ("dim_pre", self.dim_pre),
            ("freq", self.freq),
            ("n_mels", self.n_mels),
            ("dim_conv", self.dim_conv),
            ("dim_dec", self.dim_dec),
        ] {
            ensure!(value > 0, "model config '{name}' must be greater than zero");
        }
        Ok(())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> AutoVc<B> {
        let encoder = Encoder {
            convs: (0..ENCODER_CONVS)
                .map(|i| {
                    let c_in = if i == 0 { self.n_mels + self.dim_emb } else { self.dim_conv };
                    conv_norm(c_in, self.dim_conv, device)
                })
                .collect(),
            lstms: vec![
                BiLstmConfig::new(self.dim_conv, self.dim_neck, true).init(device),
                BiLstmConfig::new(2 * self.dim_neck, self.dim_neck, true).init(device),
            ],
            dim_neck: self.dim_neck,
            freq:     self.freq,
        };

        let decoder = Decoder {
            lstm_in: LstmConfig::new(2 * self.dim_neck + self.dim_emb, self.dim_pre, true)
                .init(device),
            convs: (0..DECODER_CONVS)
                .map(|_| conv_norm(self.dim_pre, self.dim_pre, device))
                .collect(),
            lstms: vec![
                LstmConfig::new(self.dim_pre, self.dim_dec, true).init(device),
                LstmConfig::new(self.dim_dec, self.dim_dec, true).init(device),
            ],
            projection: LinearConfig::new(self.dim_dec, self.n_mels).init(device),
        };

        let postnet = Postnet {
            convs: (0..POSTNET_CONVS)
                .map(|i| {
                    let c_in  = if i == 0 { self.n_mels } else { self.dim_conv };
                    let c_out = if i == POSTNET_CONVS - 1 { self.n_mels } else { self.dim_conv };
                    conv_norm(c_in, c_out, device)
                })
                .collect(),
        };

        AutoVc { encoder, decoder, postnet, freq: self.freq }
    }
}

fn conv_norm<B: Backend>(c_in: usize, c_out: usize, device: &B::Device) -> ConvNorm<B> {
    ConvNorm {
        conv: Conv1dConfig::new(c_in, c_out, KERNEL_SIZE)
            .with_padding(PaddingConfig1d::Explicit(KERNEL_SIZE / 2))
            .init(device),
        norm: BatchNormConfig::new(c_out).init(device),
    }
}

/// Length-preserving conv followed by batch norm. Input [batch, channels, time].
#[derive(Module, Debug)]
pub struct ConvNorm<B: Backend> {
    pub conv: Conv1d<B>,
    pub norm: BatchNorm<B, 1>,
}

impl<B: Backend> ConvNorm<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        self.norm.forward(self.conv.forward(x))
    }
}

#[derive(Module, Debug)]
pub struct Encoder<B: Backend> {
    pub convs:    Vec<ConvNorm<B>>,
    pub lstms:    Vec<BiLstm<B>>,
    pub dim_neck: usize,
    pub freq:     usize,
}

impl<B: Backend> Encoder<B> {
    /// mels: [batch, time, n_mels], embs: [batch, dim_emb]
    /// → time / freq codes of shape [batch, 2 * dim_neck]
    pub fn forward(&self, mels: Tensor<B, 3>, embs: Tensor<B, 2>) -> Vec<Tensor<B, 2>> {
        let [batch, time, _] = mels.dims();
        let [_, dim_emb] = embs.dims();

        let cond = embs.unsqueeze_dim::<3>(2).expand([batch, dim_emb, time]);
        let mut x = Tensor::cat(vec![mels.swap_dims(1, 2), cond], 1);
        for conv in &self.convs {
            x = relu(conv.forward(x));
        }

        let mut x = x.swap_dims(1, 2); // [batch, time, dim_conv]
        for lstm in &self.lstms {
            x = lstm.forward(x, None).0;
        }

        // forward direction read at the END of each window,
        // backward direction at its START: both have then seen
        // the whole window
        let neck = self.dim_neck;
        (0..time)
            .step_by(self.freq)
            .map(|i| {
                let last = i + self.freq - 1;
                let fwd = x.clone().slice([0..batch, last..last + 1, 0..neck]);
                let bwd = x.clone().slice([0..batch, i..i + 1, neck..2 * neck]);
                Tensor::cat(vec![fwd, bwd], 2).reshape([batch, 2 * neck])
            })
            .collect()
    }
}

#[derive(Module, Debug)]
pub struct Decoder<B: Backend> {
    pub lstm_in:    Lstm<B>,
    pub convs:      Vec<ConvNorm<B>>,
    pub lstms:      Vec<Lstm<B>>,
    pub projection: Linear<B>,
}

impl<B: Backend> Decoder<B> {
    /// x: [batch, time, 2 * dim_neck + dim_emb] → [batch, time, n_mels]
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = self.lstm_in.forward(x, None).0;

        let mut x = x.swap_dims(1, 2);
        for conv in &self.convs {
            x = relu(conv.forward(x));
        }

        let mut x = x.swap_dims(1, 2);
        for lstm in &self.lstms {
            x = lstm.forward(x, None).0;
        }
        self.projection.forward(x)
    }
}

#[derive(Module, Debug)]
pub struct Postnet<B: Backend> {
    pub convs: Vec<ConvNorm<B>>,
}

impl<B: Backend> Postnet<B> {
    /// x: [batch, n_mels, time] → residual of the same shape
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let last = self.convs.len().saturating_sub(1);
        let mut x = x;
        for (i, conv) in self.convs.iter().enumerate() {
            x = conv.forward(x);
            if i < last {
                x = x.tanh();
            }
        }
        x
    }
}

#[derive(Module, Debug)]
pub struct AutoVc<B: Backend> {
    pub encoder: Encoder<B>,
    pub decoder: Decoder<B>,
    pub postnet: Postnet<B>,
    pub freq:    usize,
}

pub struct AutoVcOutput<B: Backend> {
    /// Decoder output, [batch, time, n_mels]
    pub rec_org: Tensor<B, 3>,
    /// Decoder output refined by the postnet, [batch, time, n_mels]
    pub rec_pst: Tensor<B, 3>,
    /// Concatenated content codes, [batch, time / freq * 2 * dim_neck]
    pub codes:   Tensor<B, 2>,
}

pub struct AutoVcLosses<B: Backend> {
    pub org:     Tensor<B, 1>,
    pub pst:     Tensor<B, 1>,
    pub content: Tensor<B, 1>,
    pub total:   Tensor<B, 1>,
}

impl<B: Backend> AutoVc<B> {
    /// Self-reconstruction: the source embedding is also the target.
    pub fn forward(&self, mels: Tensor<B, 3>, embs: Tensor<B, 2>) -> AutoVcOutput<B> {
        self.convert(mels, embs.clone(), embs)
    }

    /// Encode with `src_embs`, decode with `trg_embs`.
    ///
    /// # Panics
    /// Panics if the number of frames is not a multiple of `freq`.
    pub fn convert(
        &self,
        mels:     Tensor<B, 3>,
        src_embs: Tensor<B, 2>,
        trg_embs: Tensor<B, 2>,
    ) -> AutoVcOutput<B> {
        let [batch, time, _] = mels.dims();
        let [_, dim_emb] = trg_embs.dims();
        assert!(
            time % self.freq == 0,
            "frame count ({time}) must be a multiple of freq ({})",
            self.freq
        );

        let codes = self.encoder.forward(mels, src_embs);
        let repeat = time / codes.len();

        let upsampled: Vec<Tensor<B, 3>> = codes
            .iter()
            .map(|code| {
                let [_, width] = code.dims();
                code.clone().unsqueeze_dim::<3>(1).expand([batch, repeat, width])
            })
            .collect();
        let cond = trg_embs.unsqueeze_dim::<3>(1).expand([batch, time, dim_emb]);
        let decoder_in = Tensor::cat(vec![Tensor::cat(upsampled, 1), cond], 2);

        let rec_org = self.decoder.forward(decoder_in);
        let residual = self
            .postnet
            .forward(rec_org.clone().swap_dims(1, 2))
            .swap_dims(1, 2);
        let rec_pst = rec_org.clone() + residual;

        AutoVcOutput { rec_org, rec_pst, codes: Tensor::cat(codes, 1) }
    }

    /// Encoder only: concatenated content codes for `mels`.
    pub fn content_codes(&self, mels: Tensor<B, 3>, embs: Tensor<B, 2>) -> Tensor<B, 2> {
        Tensor::cat(self.encoder.forward(mels, embs), 1)
    }

    /// Reconstruction + content-consistency objective.
    ///
    ///   org     = MSE(rec_org, mels)
    ///   pst     = MSE(rec_pst, mels)
    ///   content = L1(content_codes(rec_pst), codes)
    ///   total   = org + pst + lambda_cnt * content
    pub fn forward_loss(
        &self,
        mels:       Tensor<B, 3>,
        embs:       Tensor<B, 2>,
        lambda_cnt: f64,
    ) -> AutoVcLosses<B> {
        let out = self.forward(mels.clone(), embs.clone());
        let fb_codes = self.content_codes(out.rec_pst.clone(), embs);

        let mse = MseLoss::new();
        let org = mse.forward(out.rec_org, mels.clone(), Reduction::Mean);
        let pst = mse.forward(out.rec_pst, mels, Reduction::Mean);
        let content = (fb_codes - out.codes).abs().mean();

        let total = org.clone() + pst.clone() + content.clone().mul_scalar(lambda_cnt);
        AutoVcLosses { org, pst, content, total }
    }
}
