use burn::{
    nn::{
        gru::{Gru, GruConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::{log_softmax, softmax, tanh},
};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct Seq2SeqConfig {
    pub vocab_size:  usize,
    pub hidden_size: usize,
    #[config(default = 0.1)]
    pub dropout: f64,
}

impl Seq2SeqConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Seq2SeqModel<B> {
        let embedding = EmbeddingConfig::new(self.vocab_size, self.hidden_size).init(device);
        let encoder   = GruConfig::new(self.hidden_size, self.hidden_size, true).init(device);
        let decoder   = GruConfig::new(self.hidden_size, self.hidden_size, true).init(device);
        let attn_combine = LinearConfig::new(2 * self.hidden_size, self.hidden_size).init(device);
        let output    = LinearConfig::new(self.hidden_size, self.vocab_size).init(device);
        let dropout   = DropoutConfig::new(self.dropout).init();
        Seq2SeqModel { embedding, encoder, decoder, attn_combine, output, dropout }
    }
}

/// GRU encoder-decoder with Luong dot attention over the encoder
/// states. The embedding table is shared between the two sides.
#[derive(Module, Debug)]
pub struct Seq2SeqModel<B: Backend> {
    pub embedding:    Embedding<B>,
    pub encoder:      Gru<B>,
    pub decoder:      Gru<B>,
    pub attn_combine: Linear<B>,
    pub output:       Linear<B>,
    pub dropout:      Dropout,
}

impl<B: Backend> Seq2SeqModel<B> {
    /// encoder_input: [batch, src_len], decoder_input: [batch, tgt_len]
    /// → logits [batch, tgt_len, vocab]
    pub fn forward(
        &self,
        encoder_input: Tensor<B, 2, Int>,
        decoder_input: Tensor<B, 2, Int>,
    ) -> Tensor<B, 3> {
        let enc_emb = self.dropout.forward(self.embedding.forward(encoder_input));
        let enc_out = self.encoder.forward(enc_emb, None); // [batch, src, hidden]

        let dec_emb = self.dropout.forward(self.embedding.forward(decoder_input));
        let dec_out = self.decoder.forward(dec_emb, None); // [batch, tgt, hidden]

        // Dot attention: every decoder step scores every encoder step.
        let scores  = dec_out.clone().matmul(enc_out.clone().swap_dims(1, 2)); // [batch, tgt, src]
        let attn    = softmax(scores, 2);
        let context = attn.matmul(enc_out); // [batch, tgt, hidden]

        let combined = tanh(
            self.attn_combine
                .forward(Tensor::cat(vec![context, dec_out], 2)),
        );
        self.output.forward(combined)
    }

    /// Cross entropy over the target positions, masked by the batch
    /// weights so padding contributes nothing to the loss.
    pub fn forward_loss(
        &self,
        encoder_input: Tensor<B, 2, Int>,
        decoder_input: Tensor<B, 2, Int>,
        targets:       Tensor<B, 2, Int>,
        weights:       Tensor<B, 2>,
    ) -> Tensor<B, 1> {
        let logits    = self.forward(encoder_input, decoder_input);
        let log_probs = log_softmax(logits, 2);

        let picked = log_probs
            .gather(2, targets.unsqueeze_dim::<3>(2))
            .squeeze::<2>(2); // [batch, tgt]

        -(picked * weights.clone()).sum() / weights.sum()
    }

    /// Greedy decode: feed the growing `<go>`-prefixed prefix back
    /// through the decoder and keep the argmax of the last step,
    /// until `<eos>` or `max_len` tokens.
    pub fn generate(
        &self,
        encoder_input: Tensor<B, 2, Int>,
        go_token:      usize,
        eos_token:     usize,
        max_len:       usize,
        device:        &B::Device,
    ) -> Vec<usize> {
        let mut prefix: Vec<i32> = vec![go_token as i32];

        for _ in 0..max_len {
            let steps = prefix.len();
            let decoder_input = Tensor::<B, 1, Int>::from_ints(prefix.as_slice(), device)
                .reshape([1, steps]);

            let logits = self.forward(encoder_input.clone(), decoder_input);
            let [_, _, vocab] = logits.dims();

            let next: i64 = logits
                .slice([0..1, steps - 1..steps, 0..vocab])
                .argmax(2)
                .into_scalar()
                .elem::<i64>();

            if next as usize == eos_token {
                break;
            }
            prefix.push(next as i32);
        }

        // Strip the <go> prefix; the caller turns ids into text.
        prefix[1..].iter().map(|&id| id as usize).collect()
    }
}
