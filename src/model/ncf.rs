//! Neural collaborative filtering model
//!
//! Architecture: user ID → Embedding(du) ─┐
//!                                        ├→ concat → hidden blocks → Linear(1) → BatchNorm
//!               item ID → Embedding(dj) ─┘
//!
//! Each hidden block is Linear → LeakyReLU → BatchNorm → Dropout.
//!
//! Every BatchNorm is present only when batch normalisation is enabled.

use burn::module::Module;
use burn::nn::{
    BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Embedding, EmbeddingConfig, LeakyRelu,
    LeakyReluConfig, Linear, LinearConfig,
};
use burn::record::{FullPrecisionSettings, Recorder};
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

use crate::model::Predictor;
use crate::{ItemId, JesterError, ModelConfig, Result, UserId};

/// Configuration for the NCF model
#[derive(Debug, Clone)]
pub struct NcfConfig {
    /// Rows of the user embedding table (max user ID + 1)
    pub n_users: usize,
    /// Rows of the item embedding table (max item ID + 1)
    pub n_items: usize,
    pub user_embedding_dim: usize,
    pub item_embedding_dim: usize,
    /// Hidden layer widths, e.g. [200, 100]
    pub hidden_dims: Vec<usize>,
    pub batch_norm: bool,
    /// 0.0 disables dropout
    pub dropout: f64,
    pub leaky_relu_slope: f64,
}

impl NcfConfig {
    pub fn new(model: &ModelConfig, n_users: usize, n_items: usize) -> Self {
        NcfConfig {
            n_users,
            n_items,
            user_embedding_dim: model.user_embedding_dim,
            item_embedding_dim: model.item_embedding_dim,
            hidden_dims: model.hidden_dims.clone(),
            batch_norm: model.batch_norm,
            dropout: model.dropout,
            leaky_relu_slope: model.leaky_relu_slope,
        }
    }
}

/// Batch normalisation over the feature axis of a [batch, features] tensor
fn normalize<B: Backend>(norm: &BatchNorm<B, 1>, x: Tensor<B, 2>) -> Tensor<B, 2> {
    let [batch, features] = x.dims();
    norm.forward(x.reshape([batch, features, 1]))
        .reshape([batch, features])
}

/// A single hidden layer block: Linear → LeakyReLU → BatchNorm → Dropout
#[derive(Module, Debug)]
pub struct HiddenBlock<B: Backend> {
    linear: Linear<B>,
    activation: LeakyRelu,
    norm: Option<BatchNorm<B, 1>>,
    dropout: Option<Dropout>,
}

impl<B: Backend> HiddenBlock<B> {
    pub fn new(device: &B::Device, in_dim: usize, out_dim: usize, config: &NcfConfig) -> Self {
        HiddenBlock {
            linear: LinearConfig::new(in_dim, out_dim).init(device),
            activation: LeakyReluConfig::new()
                .with_negative_slope(config.leaky_relu_slope)
                .init(),
            norm: config
                .batch_norm
                .then(|| BatchNormConfig::new(out_dim).init(device)),
            dropout: (config.dropout > 0.0).then(|| DropoutConfig::new(config.dropout).init()),
        }
    }

    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.activation.forward(self.linear.forward(x));
        let x = match &self.norm {
            Some(norm) => normalize(norm, x),
            None => x,
        };
        match &self.dropout {
            Some(dropout) => dropout.forward(x),
            None => x,
        }
    }
}

/// Embedding + dense rating regressor
#[derive(Module, Debug)]
pub struct NcfModel<B: Backend> {
    user_embedding: Embedding<B>,
    item_embedding: Embedding<B>,
    user_norm: Option<BatchNorm<B, 1>>,
    item_norm: Option<BatchNorm<B, 1>>,
    hidden: Vec<HiddenBlock<B>>,
    output: Linear<B>,
    output_norm: Option<BatchNorm<B, 1>>,
}

impl<B: Backend> NcfModel<B> {
    /// Create a new NCF model
    pub fn new(device: &B::Device, config: &NcfConfig) -> Self {
        let mut hidden = Vec::with_capacity(config.hidden_dims.len());
        let mut in_dim = config.user_embedding_dim + config.item_embedding_dim;
        for &out_dim in &config.hidden_dims {
            hidden.push(HiddenBlock::new(device, in_dim, out_dim, config));
            in_dim = out_dim;
        }

        NcfModel {
            user_embedding: EmbeddingConfig::new(config.n_users, config.user_embedding_dim)
                .init(device),
            item_embedding: EmbeddingConfig::new(config.n_items, config.item_embedding_dim)
                .init(device),
            user_norm: config
                .batch_norm
                .then(|| BatchNormConfig::new(config.user_embedding_dim).init(device)),
            item_norm: config
                .batch_norm
                .then(|| BatchNormConfig::new(config.item_embedding_dim).init(device)),
            hidden,
            output: LinearConfig::new(in_dim, 1).init(device),
            output_norm: config
                .batch_norm
                .then(|| BatchNormConfig::new(1).init(device)),
        }
    }

    /// Forward pass
    ///
    /// # Arguments
    /// * `users` - User IDs [batch]
    /// * `items` - Item IDs [batch]
    ///
    /// # Returns
    /// Predicted ratings [batch]
    pub fn forward(&self, users: Tensor<B, 1, Int>, items: Tensor<B, 1, Int>) -> Tensor<B, 1> {
        let [batch] = users.dims();

        let user_latent = Self::lookup(&self.user_embedding, users);
        let item_latent = Self::lookup(&self.item_embedding, items);

        let user_latent = match &self.user_norm {
            Some(norm) => normalize(norm, user_latent),
            None => user_latent,
        };
        let item_latent = match &self.item_norm {
            Some(norm) => normalize(norm, item_latent),
            None => item_latent,
        };

        let mut x = Tensor::cat(vec![user_latent, item_latent], 1);
        for block in &self.hidden {
            x = block.forward(x);
        }

        let x = self.output.forward(x);
        let x = match &self.output_norm {
            Some(norm) => normalize(norm, x),
            None => x,
        };
        x.reshape([batch])
    }

    /// [batch] IDs -> [batch, dim] embedding rows
    fn lookup(embedding: &Embedding<B>, ids: Tensor<B, 1, Int>) -> Tensor<B, 2> {
        let [batch] = ids.dims();
        let latent = embedding.forward(ids.reshape([batch, 1]));
        let [_, _, dim] = latent.dims();
        latent.reshape([batch, dim])
    }

    /// Save model to file
    pub fn save(&self, path: &str) -> Result<()>
    where
        B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
        B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
    {
        let recorder = burn::record::NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        recorder
            .record(self.clone().into_record(), path.into())
            .map_err(|e| JesterError::Model(e.to_string()))
    }

    /// Load model from file
    pub fn load(device: &B::Device, path: &str, config: &NcfConfig) -> Result<Self>
    where
        B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
        B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
    {
        let recorder = burn::record::NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let record = recorder
            .load(path.into(), device)
            .map_err(|e| JesterError::Model(e.to_string()))?;

        let model = Self::new(device, config);
        Ok(model.load_record(record))
    }
}

/// Chunked inference over arbitrary (user, item) lists
pub struct NcfPredictor<'a, B: Backend> {
    model: &'a NcfModel<B>,
    device: B::Device,
    n_users: usize,
    n_items: usize,
    chunk_size: usize,
}

impl<'a, B: Backend> NcfPredictor<'a, B> {
    pub fn new(
        model: &'a NcfModel<B>,
        config: &NcfConfig,
        device: B::Device,
        chunk_size: usize,
    ) -> Self {
        NcfPredictor {
            model,
            device,
            n_users: config.n_users,
            n_items: config.n_items,
            chunk_size: chunk_size.max(1),
        }
    }

    fn check_ids(&self, users: &[UserId], items: &[ItemId]) -> Result<()> {
        if let Some(user) = users
            .iter()
            .find(|&&u| u < 0 || u as usize >= self.n_users)
        {
            return Err(JesterError::DataIntegrity(format!(
                "User {} outside embedding table of {}",
                user, self.n_users
            )));
        }
        if let Some(item) = items
            .iter()
            .find(|&&j| j < 0 || j as usize >= self.n_items)
        {
            return Err(JesterError::DataIntegrity(format!(
                "Item {} outside embedding table of {}",
                item, self.n_items
            )));
        }
        Ok(())
    }
}

impl<B: Backend> Predictor for NcfPredictor<'_, B> {
    fn predict(&self, users: &[UserId], items: &[ItemId]) -> Result<Vec<f32>> {
        if users.len() != items.len() {
            return Err(JesterError::DataIntegrity(format!(
                "Got {} user IDs but {} item IDs",
                users.len(),
                items.len()
            )));
        }
        self.check_ids(users, items)?;

        let mut predictions = Vec::with_capacity(users.len());
        for (user_chunk, item_chunk) in users
            .chunks(self.chunk_size)
            .zip(items.chunks(self.chunk_size))
        {
            let user_ids: Vec<i32> = user_chunk.iter().map(|&u| u as i32).collect();
            let item_ids: Vec<i32> = item_chunk.iter().map(|&j| j as i32).collect();

            let output = self.model.forward(
                Tensor::<B, 1, Int>::from_ints(user_ids.as_slice(), &self.device),
                Tensor::<B, 1, Int>::from_ints(item_ids.as_slice(), &self.device),
            );
            predictions.extend(output.into_data().iter::<f32>());
        }

        Ok(predictions)
    }
}
