mod finetune;
mod generation;
