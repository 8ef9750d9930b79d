mod openai_stream;
mod scripted;
