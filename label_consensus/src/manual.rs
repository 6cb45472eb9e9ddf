/*!

This is the long-form manual for `label_consensus` and `labelcons`.

## Input format

The input is a JSON document with a list of subjects (pages). Each subject holds
the assertions (labels) transcribed for it, and each assertion the distinct
answers (versions) submitted by the workers:

```text
{
  "subjects": [
    {
      "id": "page-1",
      "assertions": [
        {
          "id": "a1",
          "status": "pending",
          "name": "surname",
          "data": {},
          "versions": [
            {
              "data": { "value": "Smith" },
              "votes": 2,
              "instances": [
                { "user_id": "w1", "created": "2017-03-02T10:00:00Z" },
                { "user_id": "w2", "created": "2017-03-02T11:30:00Z" }
              ]
            }
          ]
        }
      ]
    }
  ]
}
```

The `id` of subjects and assertions and the `versions` of assertions are
mandatory. An empty or missing `value` is not an answer: it is ignored when
looking for a consensus. Timestamps are in UTC, in the form `YYYY-MM-DDTHH:MM:SSZ`.

A status of `complete` or `completed` marks an assertion that is already
resolved. Any other status is treated as pending.

## Output format

The output has the same shape. Every version carrying an answer gains a
`normalized` field with the lossless form of the answer. When a consensus is
reached, the status becomes `completed` and `data.value` holds the consensus
value.

Next to the output, `ConsensusCount.txt` has one line per subject:
`<labels with a consensus> / <labels>`.

## How a consensus is found

1. Every answer is cleaned (lossless form). By default the answer is kept as it is.
2. Answers are grouped: identical lossless forms always land in the same group.
With the lossy pass, an answer also joins a group when its lossy form (no
punctuation, lower case) is similar enough to the lossy form of a key of that
group.
3. The group(s) with the most votes form the majority. The longest key with the
most votes in them is the consensus candidate.
4. The ratio is the number of votes of the majority group over all the votes of
the label (or over the votes of the two best groups with `top2`). It is 0 when the
label has fewer than `minVotes` votes.
5. The candidate is accepted when the ratio is at least the threshold.

## Configuration

`labelcons` comes with sensible defaults. The options can be set in a JSON file
passed with `--config`; the command line flags take precedence.

| option | default | meaning |
|--------|---------|---------|
| `seuil` | 0.5 | acceptance threshold on the ratio (inclusive) |
| `minVotes` | 1 | minimum number of votes for a meaningful ratio |
| `top2` | false | ratio over the two best groups instead of all the votes |
| `lossyRatioThreshold` | 0.9 | similarity needed to merge two answers in the lossy pass |
| `lossyPass` | `disabled` | `disabled`, `whenNoConsensus` or `always` |
| `useTranslationNormalizer` | false | applies `translationTables` |
| `translationTables` | none | label name -> word -> replacement |
| `ignoreDefaults` | false | replaces placeholder answers (`n/a`, `none`, `???`) by `unknown` |
| `stripStopwords` | false | ignores common english words in the lossy comparison |
| `outputFolder` | input folder | where the outputs are written |

Translation tables are applied word by word. A trailing `.`, `,`, `;`, `)` or `]`
is kept around the replacement, and the lookup ignores the case:

```text
{
  "useTranslationNormalizer": true,
  "translationTables": {
    "occupation": { "lab": "laborer", "farm": "farmer" }
  }
}
```

## Threshold sweep

`--sweep 0.5,1.0,0.05` runs the consensus for every threshold in the range and
prints the consensus rate obtained with each one. This helps choosing a
threshold for a new dataset.

 */
